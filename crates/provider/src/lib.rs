//! Cloud Avenue Terraform Provider
//!
//! This crate implements a Terraform provider for Orange Business Cloud
//! Avenue using the Terraform Plugin Protocol v6.

pub mod docs;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;

mod generated {
    pub mod tfplugin6 {
        include!("generated/tfplugin6.rs");
    }
}

pub use generated::tfplugin6;
pub use provider::CloudAvenueProvider;
