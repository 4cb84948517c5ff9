pub mod zips;

pub use zips::{archive_name, archive_url, download_archive, extract_largest, largest_file};
