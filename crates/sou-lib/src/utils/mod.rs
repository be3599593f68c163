pub mod disk_types;
