//! Registry of initialized provisioners.

use std::collections::HashMap;

use ca_pki::Certificate;
use tracing::{info, warn};

use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::provisioner::Provisioner;

/// The active provisioners of a CA.
///
/// Built once from configuration and only read afterwards. Provisioners that
/// fail `init` are left out.
#[derive(Debug, Default)]
pub struct Collection {
    provisioners: Vec<Provisioner>,
    by_id: HashMap<String, usize>,
}

impl Collection {
    /// Initializes every provisioner and keeps those that succeed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] if two initialized provisioners share an
    /// ID.
    pub fn from_provisioners(provisioners: Vec<Provisioner>, config: &Config) -> Result<Self> {
        let mut collection = Self::default();
        for mut provisioner in provisioners {
            let id = provisioner.id();
            if let Err(e) = provisioner.init(config) {
                warn!(provisioner = %id, error = %e, "excluding provisioner");
                continue;
            }
            if collection.by_id.contains_key(&id) {
                return Err(Error::Duplicate { id });
            }
            info!(provisioner = %id, "provisioner initialized");
            collection.by_id.insert(id, collection.provisioners.len());
            collection.provisioners.push(provisioner);
        }
        Ok(collection)
    }

    /// Builds a collection from a JSON array of provisioner objects.
    ///
    /// Entries that do not parse are logged and skipped like entries that
    /// fail `init`.
    ///
    /// # Errors
    ///
    /// Fails if the document is not a JSON array, or on duplicate IDs.
    pub fn from_json(json: &str, config: &Config) -> Result<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let provisioners = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<Provisioner>(entry) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(index, error = %e, "skipping invalid provisioner configuration");
                    None
                }
            })
            .collect();
        Self::from_provisioners(provisioners, config)
    }

    /// Looks a provisioner up by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Provisioner> {
        self.by_id.get(id).map(|&i| &self.provisioners[i])
    }

    /// Looks a provisioner up by name; the first match in configuration
    /// order wins.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Provisioner> {
        self.provisioners.iter().find(|p| p.name() == name)
    }

    /// Finds the provisioner that authorized `certificate`, using its
    /// provisioner extension.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the certificate has no provisioner
    /// extension or names an unknown provisioner, and with
    /// [`Error::Extension`] if the extension does not decode.
    pub fn load_by_certificate(&self, certificate: &Certificate) -> Result<&Provisioner> {
        let extension =
            ProvisionerExtension::from_certificate(certificate)?.ok_or_else(|| Error::NotFound {
                key: format!("certificate {} has no provisioner extension", certificate.serial()),
            })?;
        let id = extension.provisioner_type.id_for(&extension.name);
        self.get(&id).ok_or(Error::NotFound { key: id })
    }

    /// Iterates in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Provisioner> {
        self.provisioners.iter()
    }

    /// Number of active provisioners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.provisioners.len()
    }

    /// Whether no provisioner is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.provisioners.is_empty()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Provisioner;
    type IntoIter = std::slice::Iter<'a, Provisioner>;

    fn into_iter(self) -> Self::IntoIter {
        self.provisioners.iter()
    }
}
