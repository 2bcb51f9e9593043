//! Typed access to the Cloud Avenue object families
//!
//! Each module adds the models of one API area and the matching methods on
//! [`Client`](crate::client::Client).

pub mod app_port_profile;
pub mod backup;
pub mod bms;
pub mod certificate;
pub mod edge;
pub mod firewall;
pub mod iam;
pub mod network;
pub mod org;
pub mod publicip;
pub mod tier0;
pub mod vdc;
pub mod vdcg;
