pub mod config;
pub mod datetime;
pub mod exiftool;
pub mod ledger;
pub mod notify;
pub mod pathplan;
pub mod run;
pub mod transfer;
pub mod util;
