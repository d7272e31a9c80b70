use crate::config::Config;
use crate::connector::{self, Connector};

pub fn list_sources(config: &Config) {
    println!("{:<10} {:<48} DESCRIPTION", "CONNECTOR", "BASE URL");
    for c in connector::all(config) {
        println!("{:<10} {:<48} {}", c.name(), c.base_url(), c.description());
    }
}
