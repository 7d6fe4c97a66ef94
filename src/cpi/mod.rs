pub mod audit;
pub mod config;
pub mod densify;
pub mod gaps;
pub mod merge;
pub mod paths;
pub mod remote;
pub mod table;
pub mod update;
pub mod util;
pub mod warn;
