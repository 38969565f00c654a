pub mod hwmon;
