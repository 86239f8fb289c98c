//! Filesystem-backed artifact store.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::compute::PooledEncoder;
use crate::compute::evolution::{
    ArtifactKey, ArtifactSink, CompressionModel, ModelError, ModelLoader, ModelSource,
};
use crate::schema::{Lattice, PhaseMetrics};

use super::{CompressionType, StorageError, read_lattices, write_lattices};

/// Stores artifacts under a results directory:
///
/// ```text
/// <root>/Seed/encoder.json
/// <root>/Seed/encoder_noisy.json
/// <root>/<experiment>/Phase<n>/encoder.json
/// <root>/<experiment>/Phase<n>/Population_<id>.vxld
/// <root>/<experiment>/Phase<n>/Metrics_<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    experiment: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            experiment: experiment.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn phase_dir(&self, experiment: &str, phase: usize) -> PathBuf {
        self.root.join(experiment).join(format!("Phase{phase}"))
    }

    pub fn lattice_path(&self, key: &ArtifactKey) -> PathBuf {
        self.phase_dir(&key.experiment, key.phase)
            .join(format!("Population_{}.vxld", key.population_id))
    }

    pub fn metrics_path(&self, key: &ArtifactKey) -> PathBuf {
        self.phase_dir(&key.experiment, key.phase)
            .join(format!("Metrics_{}.json", key.population_id))
    }

    pub fn model_path(&self, source: ModelSource) -> PathBuf {
        match source {
            ModelSource::Seed { noisy: false } => self.root.join("Seed").join("encoder.json"),
            ModelSource::Seed { noisy: true } => self.root.join("Seed").join("encoder_noisy.json"),
            ModelSource::Phase(n) => self.phase_dir(&self.experiment, n).join("encoder.json"),
        }
    }

    pub fn has_model(&self, source: ModelSource) -> bool {
        self.model_path(source).is_file()
    }

    /// Persist `encoder` as the artifact for `source`.
    pub fn save_model(
        &self,
        source: ModelSource,
        encoder: &PooledEncoder,
    ) -> Result<PathBuf, StorageError> {
        let path = self.model_path(source);
        create_parent(&path)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, encoder)?;
        writer.flush()?;
        log::debug!("Saved {} to {}", source, path.display());
        Ok(path)
    }

    /// Load the encoder stored for `source`.
    pub fn load_encoder(&self, source: ModelSource) -> Result<PooledEncoder, ModelError> {
        let path = self.model_path(source);
        if !path.is_file() {
            return Err(ModelError::Missing {
                model: source,
                path: path.display().to_string(),
            });
        }
        let file = File::open(&path).map_err(|e| ModelError::Malformed {
            model: source,
            message: e.to_string(),
        })?;
        let malformed = |message: String| ModelError::Malformed {
            model: source,
            message,
        };
        let encoder: PooledEncoder = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| malformed(e.to_string()))?;
        encoder.validate().map_err(|e| malformed(e.to_string()))?;
        Ok(encoder)
    }

    /// Read a population dump written by [`ArtifactSink::write_lattices`].
    pub fn read_lattices(&self, key: &ArtifactKey) -> Result<Vec<Lattice>, StorageError> {
        let mut reader = BufReader::new(File::open(self.lattice_path(key))?);
        read_lattices(&mut reader)
    }

    /// Write lattices under an arbitrary file name in a phase directory.
    pub fn write_phase_lattices(
        &self,
        phase: usize,
        name: &str,
        lattices: &[Lattice],
    ) -> Result<PathBuf, StorageError> {
        let path = self.phase_dir(&self.experiment, phase).join(name);
        write_dump(&path, lattices)?;
        Ok(path)
    }
}

fn create_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_dump(path: &Path, lattices: &[Lattice]) -> Result<(), StorageError> {
    create_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_lattices(&mut writer, lattices, CompressionType::preferred())?;
    writer.flush()?;
    Ok(())
}

impl ArtifactSink for FileStore {
    fn write_lattices(&self, key: &ArtifactKey, lattices: &[Lattice]) -> Result<(), StorageError> {
        let path = self.lattice_path(key);
        write_dump(&path, lattices)?;
        log::debug!("Wrote {} lattices to {}", lattices.len(), path.display());
        Ok(())
    }

    fn write_metrics(&self, key: &ArtifactKey, metrics: &PhaseMetrics) -> Result<(), StorageError> {
        let path = self.metrics_path(key);
        create_parent(&path)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, metrics)?;
        writer.flush()?;
        Ok(())
    }
}

impl ModelLoader for FileStore {
    fn load(&self, source: ModelSource) -> Result<Box<dyn CompressionModel>, ModelError> {
        Ok(Box::new(self.load_encoder(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CellLabel;
    use tempfile::TempDir;

    fn key(phase: usize, population_id: usize) -> ArtifactKey {
        ArtifactKey {
            experiment: "Exp".into(),
            phase,
            population_id,
        }
    }

    #[test]
    fn test_paths() {
        let store = FileStore::new("Results", "Exp");
        assert_eq!(
            store.lattice_path(&key(2, 1)),
            PathBuf::from("Results/Exp/Phase2/Population_1.vxld")
        );
        assert_eq!(
            store.metrics_path(&key(0, 3)),
            PathBuf::from("Results/Exp/Phase0/Metrics_3.json")
        );
        assert_eq!(
            store.model_path(ModelSource::Seed { noisy: true }),
            PathBuf::from("Results/Seed/encoder_noisy.json")
        );
        assert_eq!(
            store.model_path(ModelSource::Phase(4)),
            PathBuf::from("Results/Exp/Phase4/encoder.json")
        );
    }

    #[test]
    fn test_lattice_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        let lattices = vec![
            Lattice::from_fn([3, 3, 3], |x, _, _| {
                if x == 0 { CellLabel::Floor } else { CellLabel::Empty }
            }),
            Lattice::empty([3, 3, 3]),
        ];

        store.write_lattices(&key(1, 0), &lattices).unwrap();
        assert_eq!(store.read_lattices(&key(1, 0)).unwrap(), lattices);
    }

    #[test]
    fn test_metrics_written_as_json() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        let metrics = PhaseMetrics::new("Exp", 2, 0);

        store.write_metrics(&key(0, 2), &metrics).unwrap();
        let text = fs::read_to_string(store.metrics_path(&key(0, 2))).unwrap();
        let parsed: PhaseMetrics = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.population_id, 2);
    }

    #[test]
    fn test_missing_model() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        assert!(!store.has_model(ModelSource::Phase(0)));
        assert!(matches!(
            store.load(ModelSource::Phase(0)),
            Err(ModelError::Missing { .. })
        ));
    }

    #[test]
    fn test_malformed_model() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        let path = store.model_path(ModelSource::Seed { noisy: false });
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            store.load(ModelSource::Seed { noisy: false }),
            Err(ModelError::Malformed { .. })
        ));
    }

    #[test]
    fn test_inconsistent_model_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        let path = store.model_path(ModelSource::Phase(1));
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        fs::write(
            &path,
            r#"{"shape":[4,4,4],"block_size":0,"mean":[],"scale":[]}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load(ModelSource::Phase(1)),
            Err(ModelError::Malformed { .. })
        ));

        fs::write(
            &path,
            r#"{"shape":[4,4,4],"block_size":4,"mean":[0.0,0.0,0.0,0.0],"scale":[1.0]}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load(ModelSource::Phase(1)),
            Err(ModelError::Malformed { .. })
        ));
    }

    #[test]
    fn test_model_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "Exp");
        let encoder = PooledEncoder::identity([4, 4, 4], 2);

        store.save_model(ModelSource::Phase(0), &encoder).unwrap();
        assert!(store.has_model(ModelSource::Phase(0)));
        let loaded = store.load(ModelSource::Phase(0)).unwrap();
        assert_eq!(loaded.latent_dim(), encoder.latent_dim());
        assert_eq!(store.load_encoder(ModelSource::Phase(0)).unwrap(), encoder);
    }
}
