//! The salsa database and its inputs.

use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};
use twostage_front::{Environment, EnvironmentError, Session};

/// One template file, with the environment it is compiled against and the
/// session that owns its annotation cache.
#[salsa::input(debug)]
pub struct TemplateSource {
    #[returns(ref)]
    pub path: PathBuf,
    #[returns(deref)]
    pub text: String,
    #[returns(ref)]
    pub environment: Environment,
    #[returns(ref)]
    pub session: Session,
}

impl TemplateSource {
    /// A source compiled in a fresh session against the standard
    /// environment.
    pub fn from_text(db: &dyn salsa::Database, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        TemplateSource::new(
            db,
            path.as_ref().to_path_buf(),
            text.into(),
            Environment::standard(),
            Session::new(),
        )
    }
}

#[derive(Debug, Display, Error, From)]
pub enum LoadError {
    #[display("cannot read `{}`: {source}", path.display())]
    #[from(ignore)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Environment(EnvironmentError),
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct TwoStageDatabase {
    storage: salsa::Storage<Self>,
}

#[salsa::db]
impl salsa::Database for TwoStageDatabase {}

impl TwoStageDatabase {
    /// Reads a template file. `environment` is an optional manifest layered
    /// over the standard environment.
    pub fn load(&self, path: &Path, environment: Option<&Path>) -> Result<TemplateSource, LoadError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        let text = read(path)?;
        let mut merged = Environment::standard();
        if let Some(manifest) = environment {
            merged = merged.merge(Environment::from_json(&read(manifest)?)?);
        }
        Ok(TemplateSource::new(
            self,
            path.to_path_buf(),
            text,
            merged,
            Session::new(),
        ))
    }
}
