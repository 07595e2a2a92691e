use async_trait::async_trait;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;

use super::client::RuntimeClient;
use super::types::{Resource, ResourceKind, ResourceState};
use crate::error_handling::types::RuntimeError;

/// Ids passed to a single `inspect` invocation.
const INSPECT_BATCH: usize = 100;

/// Runtime client driving a Docker compatible command line (`docker`, `podman`).
///
/// Every call spawns the binary through `tokio::process`. Output of `inspect`
/// is parsed as JSON; failures are classified from stderr.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        info!("Using container runtime CLI: {}", binary);
        Self { binary }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[&str]) -> Result<String, RuntimeError> {
        debug!("Running: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to spawn {}: {}", self.binary, e);
                RuntimeError::RuntimeUnreachable(format!("failed to run {}: {}", self.binary, e))
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let err = if stderr.is_empty() {
            RuntimeError::Unknown(format!("{} exited with {}", self.binary, output.status))
        } else {
            classify_failure(&stderr)
        };
        debug!("{} {} failed: {:?}", self.binary, args.join(" "), err);
        Err(err)
    }

    async fn inspect(&self, object: &str, ids: &[String]) -> Result<Vec<String>, RuntimeError> {
        let mut documents = Vec::new();
        for batch in ids.chunks(INSPECT_BATCH) {
            let mut args = vec![object, "inspect"];
            args.extend(batch.iter().map(String::as_str));
            match self.run(&args).await {
                Ok(document) => documents.push(document),
                Err(RuntimeError::NotFound(e)) => {
                    // something was removed since it was listed; retry one by one
                    debug!("{} vanished during batch inspect: {}", object, e);
                    for id in batch {
                        match self.run(&[object, "inspect", id.as_str()]).await {
                            Ok(document) => documents.push(document),
                            Err(RuntimeError::NotFound(_)) => {
                                debug!("Dropping {} {}, gone before inspect", object, id);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }

    /// `rmi <id>`, untagging first when the image has several repository tags.
    async fn remove_image(&self, id: &str) -> Result<(), RuntimeError> {
        let message = match self.run(&["rmi", id]).await {
            Err(RuntimeError::Unknown(message)) if is_multi_repository(&message) => message,
            other => return other.map(|_| ()),
        };
        debug!("{} has several tags, untagging: {}", id, message);

        let mut tags = Vec::new();
        for document in self.inspect("image", &[id.to_string()]).await? {
            for image in parse_images(&document)? {
                tags.extend(image.tags);
            }
        }
        for tag in &tags {
            match self.run(&["rmi", tag.as_str()]).await {
                Ok(_) | Err(RuntimeError::NotFound(_)) => debug!("Untagged {}", tag),
                Err(e) => return Err(e),
            }
        }

        // the last untag normally deletes the image already
        match self.run(&["rmi", id]).await {
            Ok(_) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_containers(&self) -> Result<Vec<Resource>, RuntimeError> {
        let ids = parse_id_lines(&self.run(&["ps", "-a", "-q", "--no-trunc"]).await?);
        let mut resources = Vec::with_capacity(ids.len());
        for document in self.inspect("container", &ids).await? {
            resources.extend(parse_containers(&document)?);
        }
        Ok(resources)
    }

    async fn list_images(&self) -> Result<Vec<Resource>, RuntimeError> {
        let ids = parse_id_lines(&self.run(&["image", "ls", "-a", "-q", "--no-trunc"]).await?);
        let mut resources = Vec::with_capacity(ids.len());
        for document in self.inspect("image", &ids).await? {
            resources.extend(parse_images(&document)?);
        }
        Ok(resources)
    }

    async fn list_volumes(&self) -> Result<Vec<Resource>, RuntimeError> {
        let names = parse_id_lines(&self.run(&["volume", "ls", "-q"]).await?);
        Ok(names
            .into_iter()
            .map(|name| Resource::new(ResourceKind::Volume, name, ResourceState::Dangling))
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<Resource>, RuntimeError> {
        let ids = parse_id_lines(&self.run(&["network", "ls", "-q", "--no-trunc"]).await?);
        let mut resources = Vec::with_capacity(ids.len());
        for document in self.inspect("network", &ids).await? {
            resources.extend(parse_networks(&document)?);
        }
        Ok(resources)
    }
}

#[async_trait]
impl RuntimeClient for CliRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        match self.run(&["version"]).await {
            Ok(_) => {
                debug!("{} answered version check", self.binary);
                Ok(())
            }
            Err(RuntimeError::RuntimeUnreachable(e)) => Err(RuntimeError::RuntimeUnreachable(e)),
            Err(e) => {
                warn!("{} version check failed: {}", self.binary, e);
                Err(RuntimeError::RuntimeUnreachable(e.to_string()))
            }
        }
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, RuntimeError> {
        match kind {
            ResourceKind::Container => self.list_containers().await,
            ResourceKind::Image => self.list_images().await,
            ResourceKind::Volume => self.list_volumes().await,
            ResourceKind::Network => self.list_networks().await,
        }
    }

    async fn remove(&self, kind: ResourceKind, id: &str) -> Result<(), RuntimeError> {
        let args: Vec<&str> = match kind {
            ResourceKind::Container => vec!["rm", id],
            ResourceKind::Image => return self.remove_image(id).await,
            ResourceKind::Volume => vec!["volume", "rm", id],
            ResourceKind::Network => vec!["network", "rm", id],
        };
        self.run(&args).await.map(|_| ())
    }
}

/// Maps the stderr of a failed runtime command onto the error taxonomy.
pub fn classify_failure(stderr: &str) -> RuntimeError {
    static UNREACHABLE: OnceLock<Regex> = OnceLock::new();
    static NOT_FOUND: OnceLock<Regex> = OnceLock::new();
    static BUSY: OnceLock<Regex> = OnceLock::new();

    let unreachable = UNREACHABLE.get_or_init(|| {
        Regex::new(r"(?i)cannot connect to|daemon running|connection refused")
            .expect("static regex is valid")
    });
    let not_found = NOT_FOUND.get_or_init(|| {
        Regex::new(r"(?i)no such (container|image|volume|network|object)|not found|not known")
            .expect("static regex is valid")
    });
    let busy = BUSY.get_or_init(|| {
        Regex::new(
            r"(?i)in use|is being used|conflict|has active endpoints|dependent child images|is using its referenced image",
        )
        .expect("static regex is valid")
    });

    let message = stderr.trim().to_string();
    if unreachable.is_match(&message) {
        RuntimeError::RuntimeUnreachable(message)
    } else if not_found.is_match(&message) {
        RuntimeError::NotFound(message)
    } else if is_multi_repository(&message) {
        // not busy: removable once every tag is gone
        RuntimeError::Unknown(message)
    } else if busy.is_match(&message) {
        RuntimeError::ResourceBusy(message)
    } else {
        RuntimeError::Unknown(message)
    }
}

/// `rmi <id>` refuses images tagged in more than one repository.
fn is_multi_repository(stderr: &str) -> bool {
    static MULTI_REPOSITORY: OnceLock<Regex> = OnceLock::new();
    MULTI_REPOSITORY
        .get_or_init(|| {
            Regex::new(r"(?i)referenced in multiple repositories").expect("static regex is valid")
        })
        .is_match(stderr)
}

/// One id per line, blank lines dropped, duplicates removed keeping first.
fn parse_id_lines(stdout: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|id| id == line) {
            ids.push(line.to_string());
        }
    }
    ids
}

fn decode<'a, T: Deserialize<'a>>(object: &str, document: &'a str) -> Result<Vec<T>, RuntimeError> {
    serde_json::from_str(document).map_err(|e| {
        error!("Unable to parse {} inspect output: {}", object, e);
        RuntimeError::Unknown(format!("unable to parse {} inspect output: {}", object, e))
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    #[serde(alias = "id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: ContainerStateInfo,
    #[serde(default)]
    mounts: Vec<MountInfo>,
    #[serde(default)]
    network_settings: Option<NetworkSettingsInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerStateInfo {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    restarting: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MountInfo {
    #[serde(default, rename = "Type")]
    mount_type: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettingsInfo {
    #[serde(default)]
    networks: Option<HashMap<String, EndpointInfo>>,
}

#[derive(Debug, Deserialize)]
struct EndpointInfo {
    #[serde(default, rename = "NetworkID")]
    network_id: Option<String>,
}

fn parse_containers(document: &str) -> Result<Vec<Resource>, RuntimeError> {
    let inspected: Vec<ContainerInspect> = decode("container", document)?;
    Ok(inspected
        .into_iter()
        .map(|c| {
            let state = if c.state.running || c.state.paused || c.state.restarting {
                ResourceState::Running
            } else {
                ResourceState::Stopped
            };
            let mut resource = Resource::new(ResourceKind::Container, c.id, state);
            let name = c.name.trim_start_matches('/');
            if !name.is_empty() {
                resource = resource.with_name(name);
            }
            if !c.image.is_empty() {
                resource = resource.referencing(ResourceKind::Image, c.image);
            }
            for mount in c.mounts {
                if mount.mount_type == "volume" {
                    if let Some(volume) = mount.name.filter(|n| !n.is_empty()) {
                        resource = resource.referencing(ResourceKind::Volume, volume);
                    }
                }
            }
            let networks = c
                .network_settings
                .and_then(|s| s.networks)
                .unwrap_or_default();
            for endpoint in networks.into_values() {
                if let Some(network) = endpoint.network_id.filter(|n| !n.is_empty()) {
                    resource = resource.referencing(ResourceKind::Network, network);
                }
            }
            resource
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageInspect {
    #[serde(alias = "id")]
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    #[serde(default)]
    parent: Option<String>,
}

fn parse_images(document: &str) -> Result<Vec<Resource>, RuntimeError> {
    let inspected: Vec<ImageInspect> = decode("image", document)?;
    Ok(inspected
        .into_iter()
        .map(|i| {
            let mut resource = Resource::new(ResourceKind::Image, i.id, ResourceState::Dangling);
            for tag in i.repo_tags.unwrap_or_default() {
                if tag != "<none>:<none>" {
                    resource = resource.with_tag(tag);
                }
            }
            if let Some(first) = resource.tags.first().cloned() {
                resource = resource.with_name(first);
            }
            if let Some(parent) = i.parent.filter(|p| !p.is_empty()) {
                resource = resource.referencing(ResourceKind::Image, parent);
            }
            resource
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct NetworkInspect {
    #[serde(rename = "Id", alias = "id")]
    id: String,
    #[serde(default, rename = "Name", alias = "name")]
    name: String,
}

fn parse_networks(document: &str) -> Result<Vec<Resource>, RuntimeError> {
    let inspected: Vec<NetworkInspect> = decode("network", document)?;
    Ok(inspected
        .into_iter()
        .map(|n| {
            let resource = Resource::new(ResourceKind::Network, n.id, ResourceState::Dangling);
            if n.name.is_empty() {
                resource
            } else {
                resource.with_name(n.name)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_client::snapshot::Snapshot;
    use crate::runtime_client::types::ResourceKey;

    #[test]
    fn classifies_docker_error_messages() {
        assert!(matches!(
            classify_failure("Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"),
            RuntimeError::RuntimeUnreachable(_)
        ));
        assert!(matches!(
            classify_failure("Error response from daemon: No such container: abc"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("Error: network web_default not found"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("Error response from daemon: remove data: volume is in use - [4f2c]"),
            RuntimeError::ResourceBusy(_)
        ));
        assert!(matches!(
            classify_failure("Error response from daemon: conflict: unable to delete 1a2b (cannot be forced) - image has dependent child images"),
            RuntimeError::ResourceBusy(_)
        ));
        assert!(matches!(
            classify_failure("error while removing network: network web id 9f has active endpoints"),
            RuntimeError::ResourceBusy(_)
        ));
    }

    #[test]
    fn multi_repository_conflict_is_not_busy() {
        let err = classify_failure(
            "Error response from daemon: conflict: unable to delete 1a2b3c4d (must be forced) - image is referenced in multiple repositories",
        );
        assert!(matches!(err, RuntimeError::Unknown(_)));
        assert!(is_multi_repository(&err.to_string()));
    }

    #[test]
    fn unknown_failures_keep_the_raw_message() {
        assert_eq!(
            classify_failure("  permission denied while trying to write\n"),
            RuntimeError::Unknown("permission denied while trying to write".to_string())
        );
    }

    #[test]
    fn id_lines_are_trimmed_and_deduplicated() {
        let ids = parse_id_lines("sha256:aa\n\nsha256:bb\nsha256:aa\n  \n");
        assert_eq!(ids, vec!["sha256:aa".to_string(), "sha256:bb".to_string()]);
    }

    #[test]
    fn parses_container_inspect_output() {
        let json = r#"[
            {
                "Id": "c0ffee",
                "Name": "/web",
                "Image": "sha256:img",
                "State": { "Status": "exited", "Running": false, "Paused": false, "Restarting": false },
                "Mounts": [
                    { "Type": "volume", "Name": "pgdata", "Source": "/var/lib/docker/volumes/pgdata/_data" },
                    { "Type": "bind", "Source": "/home/me/src" }
                ],
                "NetworkSettings": {
                    "Networks": { "app_default": { "NetworkID": "net1" } }
                }
            },
            {
                "Id": "beef",
                "Name": "/db",
                "Image": "sha256:img",
                "State": { "Running": true },
                "Mounts": [],
                "NetworkSettings": { "Networks": {} }
            }
        ]"#;

        let containers = parse_containers(json).unwrap();
        assert_eq!(containers.len(), 2);

        let web = &containers[0];
        assert_eq!(web.name.as_deref(), Some("web"));
        assert_eq!(web.state, ResourceState::Stopped);
        assert!(web.references.contains(&ResourceKey::new(ResourceKind::Image, "sha256:img")));
        assert!(web.references.contains(&ResourceKey::new(ResourceKind::Volume, "pgdata")));
        assert!(web.references.contains(&ResourceKey::new(ResourceKind::Network, "net1")));
        assert_eq!(web.references.len(), 3);

        assert_eq!(containers[1].state, ResourceState::Running);
    }

    #[test]
    fn parses_image_inspect_output() {
        let json = r#"[
            { "Id": "sha256:child", "RepoTags": ["app:latest", "app:1.2"], "Parent": "sha256:base" },
            { "Id": "sha256:base", "RepoTags": [], "Parent": "" },
            { "Id": "sha256:old", "RepoTags": null }
        ]"#;

        let images = parse_images(json).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].tags, vec!["app:latest", "app:1.2"]);
        assert_eq!(images[0].name.as_deref(), Some("app:latest"));
        assert_eq!(
            images[0].references,
            vec![ResourceKey::new(ResourceKind::Image, "sha256:base")]
        );
        assert!(images[1].tags.is_empty());
        assert!(images[1].references.is_empty());
        assert!(images[2].name.is_none());
    }

    #[test]
    fn parses_docker_and_podman_network_output() {
        let docker = r#"[{ "Id": "n1", "Name": "bridge", "Driver": "bridge" }]"#;
        let podman = r#"[{ "id": "n2", "name": "podman", "driver": "bridge" }]"#;

        let parsed = parse_networks(docker).unwrap();
        assert_eq!(parsed[0].id, "n1");
        assert_eq!(parsed[0].name.as_deref(), Some("bridge"));

        let parsed = parse_networks(podman).unwrap();
        assert_eq!(parsed[0].id, "n2");
        assert_eq!(parsed[0].name.as_deref(), Some("podman"));
    }

    #[test]
    fn malformed_inspect_output_is_an_error() {
        assert!(matches!(parse_images("not json"), Err(RuntimeError::Unknown(_))));
    }

    /// Writes a shell script standing in for the runtime CLI. `$DIR` points at `dir`.
    #[cfg(unix)]
    fn fake_runtime(dir: &std::path::Path, body: &str) -> CliRuntime {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-runtime");
        let script = format!("#!/bin/sh\nDIR='{}'\n{}", dir.display(), body);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        CliRuntime::new(path.to_str().unwrap())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn container_gone_before_inspect_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(
            dir.path(),
            r##"C1='[{"Id":"c1","Name":"/web","State":{"Running":false}}]'
case "$*" in
  "ps -a -q --no-trunc") printf 'c1\nc2\n' ;;
  "container inspect c1 c2") echo "$C1"; echo 'Error: No such object: c2' >&2; exit 1 ;;
  "container inspect c1") echo "$C1" ;;
  "container inspect c2") echo '[]'; echo 'Error: No such object: c2' >&2; exit 1 ;;
esac
"##,
        );

        let snapshot = Snapshot::capture(&runtime).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        let web = snapshot
            .position_of(&ResourceKey::new(ResourceKind::Container, "c1"))
            .map(|p| snapshot.resource(p));
        assert_eq!(web.and_then(|r| r.name.as_deref()), Some("web"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreachable_during_inspect_is_still_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(
            dir.path(),
            r##"case "$*" in
  "ps -a -q --no-trunc") printf 'c1\n' ;;
  "container inspect c1") echo 'Cannot connect to the Docker daemon. Is the docker daemon running?' >&2; exit 1 ;;
esac
"##,
        );

        let err = Snapshot::capture(&runtime).await.unwrap_err();
        assert!(matches!(err, RuntimeError::RuntimeUnreachable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn image_with_several_tags_is_untagged_then_removed() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(
            dir.path(),
            r##"echo "$*" >> "$DIR/calls"
case "$*" in
  "rmi sha256:aa")
    if [ -f "$DIR/gone" ]; then
      echo 'Error response from daemon: No such image: sha256:aa' >&2; exit 1
    fi
    echo 'Error response from daemon: conflict: unable to delete sha256:aa (must be forced) - image is referenced in multiple repositories' >&2
    exit 1 ;;
  "image inspect sha256:aa") echo '[{"Id":"sha256:aa","RepoTags":["app:1","app:latest"]}]' ;;
  "rmi app:1") echo 'Untagged: app:1' ;;
  "rmi app:latest") echo 'Untagged: app:latest'; touch "$DIR/gone" ;;
esac
"##,
        );

        runtime.remove(ResourceKind::Image, "sha256:aa").await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("calls")).unwrap();
        assert_eq!(
            calls.lines().collect::<Vec<_>>(),
            vec![
                "rmi sha256:aa",
                "image inspect sha256:aa",
                "rmi app:1",
                "rmi app:latest",
                "rmi sha256:aa",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_unreachable() {
        let runtime = CliRuntime::new("definitely-not-a-container-runtime-binary");
        let err = runtime.ping().await.unwrap_err();
        assert!(matches!(err, RuntimeError::RuntimeUnreachable(_)));
    }
}
