//! Multi-site storage topology bootstrap
//!
//! Creates the realm, master zone group and master zone for a gateway with
//! `radosgw-admin`, in that order, and extracts each entity's ID from the JSON
//! the admin tool prints. All three entities share the gateway's name.
//!
//! An entity left behind by an earlier run makes its `create` exit with
//! EEXIST; its ID is then read back with the matching `get` command so a
//! re-run can continue. Any other failed command aborts the sequence with
//! [`Error::Execution`]. Output that does not carry an ID aborts it with
//! [`Error::TopologyParse`]; an empty ID is never passed on.

use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use thiserror::Error;
use tracing::info;

use crate::exec::AdminCommandRunner;
use crate::{Error, Result};

/// Topology entities created by the bootstrap, in creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyEntity {
    /// Top-level multi-site namespace
    Realm,
    /// Group of zones inside a realm
    ZoneGroup,
    /// Storage placement unit inside a zone group
    Zone,
}

impl fmt::Display for TopologyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopologyEntity::Realm => "realm",
            TopologyEntity::ZoneGroup => "zonegroup",
            TopologyEntity::Zone => "zone",
        };
        f.write_str(s)
    }
}

/// Why admin command output did not yield an ID
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// Output was not a JSON object
    #[error("malformed output: {0}")]
    Malformed(String),

    /// Output was a JSON object without a non-empty string `id`
    #[error("output has no id field")]
    MissingId,
}

/// IDs of the created topology entities
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopologyIds {
    /// Realm ID
    pub realm_id: String,
    /// Master zone group ID
    pub zone_group_id: String,
    /// Master zone ID
    pub zone_id: String,
}

/// Deserialize the first JSON value in `output`, ignoring anything after it
///
/// Admin commands report on stdout and may append diagnostics on stderr, so
/// trailing text after a complete value is not an error.
pub fn decode_leading_json<T: DeserializeOwned>(output: &str) -> serde_json::Result<T> {
    serde_json::Deserializer::from_str(output)
        .into_iter::<T>()
        .next()
        .unwrap_or_else(|| Err(serde_json::Error::custom("empty output")))
}

/// Extract the `id` field from admin command output
pub fn decode_id(output: &str) -> std::result::Result<String, ParseFailure> {
    let value: serde_json::Value =
        decode_leading_json(output).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ParseFailure::Malformed("expected a JSON object".to_string()))?;

    match object.get("id").and_then(|id| id.as_str()) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ParseFailure::MissingId),
    }
}

/// Endpoint URL handed to the zone group and zone
///
/// Without an address this renders as `:<port>`, which the admin tool accepts.
pub fn endpoint(address: Option<&str>, port: u16) -> String {
    format!("{}:{}", address.unwrap_or_default(), port)
}

/// Run `<entity> create <create_args> <names>`, falling back to
/// `<entity> get <names>` when the entity already exists
async fn create_entity(
    runner: &AdminCommandRunner,
    entity: TopologyEntity,
    create_args: &[&str],
    names: &[&str],
) -> Result<String> {
    let kind = entity.to_string();

    let mut args = vec![kind.as_str(), "create"];
    args.extend_from_slice(create_args);
    args.extend_from_slice(names);

    let output = match runner.run_rgw_admin(&args).await {
        Ok(output) => output,
        Err(Error::Execution { source, .. }) if source.is_already_exists() => {
            info!(entity = %entity, "rgw {} already exists, reading its id", entity);
            let mut args = vec![kind.as_str(), "get"];
            args.extend_from_slice(names);
            runner.run_rgw_admin(&args).await?
        }
        Err(e) => return Err(e),
    };
    decode_id(&output).map_err(|e| Error::topology_parse(entity, e))
}

/// Create the realm, master zone group and master zone named `name`
pub async fn bootstrap_topology(
    runner: &AdminCommandRunner,
    name: &str,
    address: Option<&str>,
    port: u16,
) -> Result<TopologyIds> {
    let endpoints = format!("--endpoints={}", endpoint(address, port));
    let realm = format!("--rgw-realm={}", name);
    let zone_group = format!("--rgw-zonegroup={}", name);
    let zone = format!("--rgw-zone={}", name);

    let realm_id = create_entity(runner, TopologyEntity::Realm, &[], &[realm.as_str()]).await?;

    let zone_group_id = create_entity(
        runner,
        TopologyEntity::ZoneGroup,
        &["--master", endpoints.as_str()],
        &[zone_group.as_str(), realm.as_str()],
    )
    .await?;

    let zone_id = create_entity(
        runner,
        TopologyEntity::Zone,
        &["--master", endpoints.as_str()],
        &[zone.as_str(), zone_group.as_str(), realm.as_str()],
    )
    .await?;

    info!(
        realm = %realm_id,
        zonegroup = %zone_group_id,
        zone = %zone_id,
        "rgw topology created"
    );

    Ok(TopologyIds {
        realm_id,
        zone_group_id,
        zone_id,
    })
}
