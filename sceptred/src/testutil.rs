//! Fixtures shared by unit tests.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::codec::TILE_SIZE;

/// ASCII grid text of `TILE_SIZE` rows, each sample produced by `sample(row, col)`.
pub fn grid_text(sample: impl Fn(usize, usize) -> String) -> String {
    let mut text = format!(
        "ncols        {size}\nnrows        {size}\nxllcorner    320000\nyllcorner    670000\ncellsize     50\nNODATA_value -9999\n",
        size = TILE_SIZE
    );
    for row in 0..TILE_SIZE {
        let line: Vec<String> = (0..TILE_SIZE).map(|col| sample(row, col)).collect();
        text.push_str(&line.join(" "));
        text.push('\n');
    }
    text
}

/// Write a zip archive at `dir/name` with one member holding `contents`.
pub fn write_archive(dir: &Path, name: &str, member: &str, contents: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let file = File::create(&path).unwrap();

    let mut writer = ZipWriter::new(file);
    writer
        .start_file(
            member,
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        )
        .unwrap();
    writer.write_all(contents.as_bytes()).unwrap();
    writer.finish().unwrap();

    path
}
