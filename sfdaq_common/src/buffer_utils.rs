//! Pulse id to on-disk location mapping.
//!
//! Writers store frames in a fixed folder/file grid: every `FOLDER_MOD`
//! pulses open a new folder and every `FILE_MOD` pulses a new file, inside
//! which the frame lands at `get_file_frame_index(pulse_id)`. The functions
//! here only compute names and offsets; they never touch the filesystem.

use crate::consts::{FILE_EXTENSION, FILE_MOD, FOLDER_MOD};
use std::path::{Path, PathBuf};

/// Path of the file holding `pulse_id` for one module.
///
/// `<detector_folder>/<module_name>/<folder base>/<file base>.bin`
pub fn get_filename(detector_folder: &Path, module_name: &str, pulse_id: u64) -> PathBuf {
    let data_folder = (pulse_id / FOLDER_MOD) * FOLDER_MOD;
    let data_file = (pulse_id / FILE_MOD) * FILE_MOD;

    detector_folder
        .join(module_name)
        .join(data_folder.to_string())
        .join(format!("{data_file}{FILE_EXTENSION}"))
}

/// Frame position of `pulse_id` inside its file.
#[inline]
pub fn get_file_frame_index(pulse_id: u64) -> u64 {
    pulse_id - (pulse_id / FILE_MOD) * FILE_MOD
}
