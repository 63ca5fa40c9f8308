pub mod usage_record;
