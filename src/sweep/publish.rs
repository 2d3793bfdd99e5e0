use crate::directory::EvidenceSink;
use crate::ledger::ActionLedger;
use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Atomically copies artifacts into a local (or mounted) directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl EvidenceSink for DirectorySink {
    fn destination(&self) -> String {
        self.dir.display().to_string()
    }

    fn publish(&self, local_path: &Path) -> Result<()> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| anyhow!("artifact path has no file name: {}", local_path.display()))?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let dest = self.dir.join(file_name);
        let mut source = File::open(local_path)
            .with_context(|| format!("open artifact {}", local_path.display()))?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("stage in {}", self.dir.display()))?;
        io::copy(&mut source, staged.as_file_mut())
            .with_context(|| format!("copy {}", local_path.display()))?;
        staged
            .as_file()
            .sync_all()
            .with_context(|| format!("sync {}", dest.display()))?;
        staged
            .persist(&dest)
            .map_err(|err| err.error)
            .with_context(|| format!("publish {}", dest.display()))?;
        Ok(())
    }
}

/// Hand every artifact to the sink once. Returns `true` when any publish
/// failed; failures are logged and never propagate.
pub fn publish_evidence(
    sink: &dyn EvidenceSink,
    artifacts: &[PathBuf],
    ledger: &mut ActionLedger,
) -> bool {
    let destination = sink.destination();
    let mut failed = false;
    for artifact in artifacts {
        let name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.display().to_string());
        match sink.publish(artifact) {
            Ok(()) => {
                ledger.log_action(&format!("PUBLISHED: {name} -> {destination}"));
                tracing::info!(artifact = %name, destination = %destination, "artifact published");
            }
            Err(err) => {
                failed = true;
                ledger.log_action(&format!(
                    "ERROR: publish {name} -> {destination} failed: {err:#}"
                ));
                tracing::error!(
                    artifact = %name,
                    destination = %destination,
                    error = %format!("{err:#}"),
                    "artifact publish failed"
                );
            }
        }
    }
    failed
}
