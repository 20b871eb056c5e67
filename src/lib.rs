pub mod chembl;
pub mod config;
pub mod domain;
pub mod error;
pub mod g2p;
pub mod hit;
pub mod http;
pub mod output;
pub mod runner;
pub mod search;
pub mod searches;
pub mod store;
pub mod table;
pub mod target;
pub mod taxonomy;
pub mod uniprot;
