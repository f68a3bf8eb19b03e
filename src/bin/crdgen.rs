//! Print the MongoDBConfig and MongoDBData CustomResourceDefinitions as YAML.
//!
//! Usage:
//!   cargo run --bin crdgen > config/crd/crds.yaml

use kube::CustomResourceExt;
use mongodb_data_controller::{MongoDBConfig, MongoDBData};

fn main() -> anyhow::Result<()> {
    let config_crd = serde_yaml::to_string(&MongoDBConfig::crd())?;
    let data_crd = serde_yaml::to_string(&MongoDBData::crd())?;
    print!("{config_crd}---\n{data_crd}");
    Ok(())
}
