extern crate log;

use self::log::debug;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::path;

///
pub struct FileHelper {}

impl FileHelper {
    /// Writes the content to a file (Creates it, if it doesn't exist and overwrites, if it does)
    pub fn write_to_file(file_path: &str, content: &str) -> Result<(), io::Error> {
        debug!("Creating new file: {}", file_path);
        let mut only_path = String::new();
        let length = file_path.split('/').count();
        for (i, v) in file_path.split('/').enumerate() {
            if v.is_empty() || i == length - 1 {
                continue;
            }
            only_path = only_path + v + "/";
        }

        fs::create_dir_all(only_path)?;
        let mut file = fs::File::create(file_path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Returns true if the file exists
    pub fn file_exists(file_path: &str) -> bool {
        path::Path::new(file_path).exists()
    }

    /// Reads the content of a file and returns a String (using String::from_utf8())
    pub fn read_file_to_string(file_path: &str) -> Result<String, io::Error> {
        debug!("Reading content of {}", file_path);
        let mut content: Vec<u8> = Vec::new();
        let mut file = fs::OpenOptions::new().read(true).open(file_path)?;
        let _ = file.read_to_end(&mut content)?;
        match String::from_utf8(content) {
            Ok(s) => Ok(s),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "UTF 8 conversion failed",
            )),
        }
    }
}
