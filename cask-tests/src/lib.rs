mod defaults;
mod iteration;
mod lifecycle;
mod multicursor;
mod simple;
#[cfg(not(feature = "disable-transactions"))]
mod transactions;
mod type_adapters;

use crate::{
    defaults::defaults,
    iteration::iteration,
    lifecycle::{closed_connection, lifecycle},
    multicursor::multicursor,
    simple::simple,
    type_adapters::type_adapters,
};
use cask_core::{ConnectOptions, Connection, Driver};
use log::LevelFilter;
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transactions::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run the whole suite against `driver`.
///
/// Every test opens its own connections from `options`, adjusting the
/// detection flags, the isolation level and the registry it needs.
pub async fn execute_tests<D: Driver + Clone>(driver: D, options: ConnectOptions) {
    simple(&driver, &options).await;
    multicursor(&driver, &options).await;
    iteration(&driver, &options).await;
    type_adapters(&driver, &options).await;
    defaults(&driver, &options).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(&driver, &options).await;
    lifecycle(&driver, &options).await;
    closed_connection(&driver, &options).await;
}

pub(crate) async fn open<D: Driver + Clone>(driver: &D, options: ConnectOptions) -> Connection<D> {
    Connection::connect(driver.clone(), options)
        .await
        .expect("Could not open the connection")
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
