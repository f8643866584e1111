use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// Reads a whole text file into memory.
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents)
}

/// Writes `contents` to `filename`, replacing any existing file.
///
/// Single blocking write, no atomic rename.
pub(crate) fn write_file<P: AsRef<Path>>(filename: P, contents: &[u8]) -> io::Result<()> {
	let mut file = File::create(filename)?;
	file.write_all(contents)?;
	file.flush()
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_then_read_replaces_content() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("model.json");
		write_file(&path, b"first version").expect("write");
		write_file(&path, b"second").expect("overwrite");
		assert_eq!(read_file(&path).expect("read"), "second");
	}

	#[test]
	fn test_list_files_filters_extension() {
		let dir = tempfile::tempdir().expect("tempdir");
		for name in ["b.json", "a.json", "notes.txt"] {
			write_file(dir.path().join(name), b"{}").expect("write");
		}
		fs::create_dir(dir.path().join("nested.json")).expect("mkdir");

		let files = list_files(dir.path(), "json").expect("list");
		assert_eq!(files, vec!["a.json", "b.json"]);
	}
}
