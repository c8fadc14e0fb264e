pub mod file_names_fl;
