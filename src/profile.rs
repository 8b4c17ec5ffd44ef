use crate::error::{ProfileError, Result};
use crate::signal::SignalId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The single local record describing the owner and their dog
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DogProfile {
    pub owner_first_name: String,
    pub email: String,
    pub phone: String,
    /// May be left empty
    pub dog_name: String,
    #[serde(deserialize_with = "lenient_signal_id")]
    pub default_signal_id: SignalId,
}

impl DogProfile {
    /// True when owner first name, email and dog name are all filled in
    pub fn is_complete(&self) -> bool {
        [&self.owner_first_name, &self.email, &self.dog_name]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Check the fields required to save the profile form.
    ///
    /// Every missing field is reported, not just the first.
    pub fn validate(&self) -> std::result::Result<(), ProfileError> {
        let missing: Vec<&'static str> = [
            ("ownerFirstName", &self.owner_first_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProfileError::MissingFields(missing))
        }
    }
}

// An unknown stored signal falls back to the default instead of discarding
// the rest of the record
fn lenient_signal_id<'de, D>(deserializer: D) -> std::result::Result<SignalId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| value.parse().ok())
        .unwrap_or_default())
}

/// File-backed store for the [`DogProfile`]
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored profile, or the empty profile when nothing usable is
    /// stored
    pub fn load(&self) -> DogProfile {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No profile at {}", self.path.display());
                return DogProfile::default();
            }
            Err(e) => {
                warn!("Cannot read profile {}: {}", self.path.display(), e);
                return DogProfile::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(
                    "Ignoring corrupt profile {}: {}",
                    self.path.display(),
                    e
                );
                DogProfile::default()
            }
        }
    }

    /// Persist the profile, replacing any previous record atomically
    pub fn save(&self, profile: &DogProfile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(profile)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        info!("Profile saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored profile. Clearing an absent profile succeeds.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Profile {} cleared", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_profile(&self) -> bool {
        self.load().is_complete()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
