pub mod ash_staging;
pub mod frame_loop;

/// Initialize logging for tests, may be called any number of times.
pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}
