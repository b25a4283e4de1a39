use opcua::client::prelude::*;

use super::nodes::SawmillVar;
use crate::error::{Result, SawmillError};
use crate::simulator::SawmillState;

/// Connects to a running sawmill server and reads every process variable.
pub async fn probe(endpoint: String, namespace_uri: String) -> Result<SawmillState> {
    tokio::task::spawn_blocking(move || probe_blocking(&endpoint, &namespace_uri)).await?
}

fn probe_blocking(endpoint: &str, namespace_uri: &str) -> Result<SawmillState> {
    tracing::info!("Probing sawmill server at {}", endpoint);

    let mut client = ClientBuilder::new()
        .application_name("Sawmill Probe")
        .application_uri("urn:sawmill:probe")
        .create_sample_keypair(true)
        .trust_server_certs(true)
        .session_retry_limit(1)
        .client()
        .ok_or_else(|| SawmillError::ClientBuild {
            message: "invalid probe client configuration".to_string(),
        })?;

    let session = client.connect_to_endpoint(
        (
            endpoint,
            SecurityPolicy::None.to_str(),
            MessageSecurityMode::None,
            UserTokenPolicy::anonymous(),
        ),
        IdentityToken::Anonymous,
    )?;

    let result = {
        let session = session.read();
        read_sawmill(&session, namespace_uri)
    };

    session.read().disconnect();
    result
}

fn read_sawmill(session: &Session, namespace_uri: &str) -> Result<SawmillState> {
    let namespace = resolve_namespace(session, namespace_uri)?;
    tracing::debug!("Namespace {} has index {}", namespace_uri, namespace);

    let nodes_to_read: Vec<ReadValueId> = SawmillVar::ALL
        .iter()
        .map(|var| ReadValueId::from(var.node_id(namespace)))
        .collect();
    let values = session.read(&nodes_to_read, TimestampsToReturn::Neither, 0.0)?;

    let mut state = SawmillState::default();
    for (var, data_value) in SawmillVar::ALL.iter().zip(values.iter()) {
        let applied = data_value
            .value
            .as_ref()
            .map(|value| var.apply(&mut state, value))
            .unwrap_or(false);
        if !applied {
            return Err(SawmillError::address_space(format!(
                "unexpected value for {}: {:?}",
                var.node_path(),
                data_value.status
            )));
        }
    }

    Ok(state)
}

fn resolve_namespace(session: &Session, namespace_uri: &str) -> Result<u16> {
    let node_id: NodeId = VariableId::Server_NamespaceArray.into();
    let values = session.read(
        &[ReadValueId::from(node_id)],
        TimestampsToReturn::Neither,
        0.0,
    )?;

    let uris = match values.first().and_then(|dv| dv.value.as_ref()) {
        Some(Variant::Array(array)) => array
            .values
            .iter()
            .map(|v| match v {
                Variant::String(s) => s.as_ref().to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };

    namespace_index(&uris, namespace_uri).ok_or_else(|| {
        SawmillError::address_space(format!("namespace {namespace_uri} not registered on server"))
    })
}

fn namespace_index(uris: &[String], namespace_uri: &str) -> Option<u16> {
    uris.iter()
        .position(|uri| uri == namespace_uri)
        .and_then(|idx| u16::try_from(idx).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_namespace_index() {
        let uris = vec![
            "http://opcfoundation.org/UA/".to_string(),
            "urn:sawmill:server".to_string(),
            "http://examples.freeopcua.github.io".to_string(),
        ];
        assert_eq!(
            namespace_index(&uris, "http://examples.freeopcua.github.io"),
            Some(2)
        );
        assert_eq!(namespace_index(&uris, "urn:missing"), None);
    }
}
