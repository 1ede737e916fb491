//! Rate sheet catalogs and their persistence

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rates::RangeTable;
use crate::traits::*;
use crate::types::*;

/// Platform types every new rate sheet is seeded with
pub const STANDARD_PLATFORM_TYPES: [&str; 8] = [
    "UPI",
    "DebitCard",
    "NetBanking",
    "CreditCard",
    "Wallet",
    "PayLater",
    "CardLess",
    "CORPORATE CARDS",
];

/// All platform charges of one owner
///
/// Keys are `(platform_type, payment_mode)` compared case-insensitively and
/// are unique within a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PlatformCharge>", into = "Vec<PlatformCharge>")]
pub struct ChargeCatalog {
    entries: Vec<PlatformCharge>,
}

impl ChargeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a zero-rated `Others` entry for every standard platform type
    pub fn with_default_platforms() -> Self {
        Self {
            entries: STANDARD_PLATFORM_TYPES
                .iter()
                .map(|platform| PlatformCharge::zero_rated(*platform, OTHERS_MODE))
                .collect(),
        }
    }

    /// Build a catalog from entries, enforcing key uniqueness
    pub fn from_entries(entries: Vec<PlatformCharge>) -> FeeResult<Self> {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add(entry)?;
        }
        Ok(catalog)
    }

    pub fn entries(&self) -> &[PlatformCharge] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, platform_type: &str, payment_mode: &str) -> Option<&PlatformCharge> {
        self.entries
            .iter()
            .find(|entry| entry.has_key(platform_type, payment_mode))
    }

    /// Exact entry for the key, falling back to the platform's `Others` entry
    pub fn lookup_entry(
        &self,
        platform_type: &str,
        payment_mode: &str,
    ) -> FeeResult<&PlatformCharge> {
        if let Some(entry) = self.find(platform_type, payment_mode) {
            return Ok(entry);
        }

        if let Some(entry) = self.find(platform_type, OTHERS_MODE) {
            debug!(platform_type, payment_mode, "falling back to Others charge");
            return Ok(entry);
        }

        Err(FeeError::NoChargeConfigured {
            platform_type: platform_type.to_string(),
            payment_mode: payment_mode.to_string(),
        })
    }

    /// Range table for the key, with the `Others` fallback
    pub fn lookup(&self, platform_type: &str, payment_mode: &str) -> FeeResult<RangeTable> {
        self.lookup_entry(platform_type, payment_mode)
            .map(|entry| RangeTable::new(entry.range_charge.clone()))
    }

    /// Add an entry checked by the default validator
    pub fn add(&mut self, entry: PlatformCharge) -> FeeResult<()> {
        self.add_validated(entry, &DefaultChargeValidator)
    }

    /// Add an entry checked by a custom validator
    pub fn add_validated(
        &mut self,
        entry: PlatformCharge,
        validator: &dyn ChargeValidator,
    ) -> FeeResult<()> {
        validator.validate_charge(&entry)?;

        if self.find(&entry.platform_type, &entry.payment_mode).is_some() {
            return Err(FeeError::DuplicateChargeKey {
                platform_type: entry.platform_type,
                payment_mode: entry.payment_mode,
            });
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Replace the tiers of an existing entry
    pub fn update(&mut self, entry: PlatformCharge) -> FeeResult<()> {
        DefaultChargeValidator.validate_charge(&entry)?;

        match self
            .entries
            .iter_mut()
            .find(|existing| existing.has_key(&entry.platform_type, &entry.payment_mode))
        {
            Some(existing) => {
                existing.range_charge = entry.range_charge;
                Ok(())
            }
            None => Err(FeeError::ChargeNotFound {
                platform_type: entry.platform_type,
                payment_mode: entry.payment_mode,
            }),
        }
    }

    /// Remove the entry for the key and return it
    pub fn delete(&mut self, platform_type: &str, payment_mode: &str) -> FeeResult<PlatformCharge> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.has_key(platform_type, payment_mode))
            .ok_or_else(|| FeeError::ChargeNotFound {
                platform_type: platform_type.to_string(),
                payment_mode: payment_mode.to_string(),
            })?;

        Ok(self.entries.remove(position))
    }
}

impl TryFrom<Vec<PlatformCharge>> for ChargeCatalog {
    type Error = FeeError;

    fn try_from(entries: Vec<PlatformCharge>) -> FeeResult<Self> {
        Self::from_entries(entries)
    }
}

impl From<ChargeCatalog> for Vec<PlatformCharge> {
    fn from(catalog: ChargeCatalog) -> Self {
        catalog.entries
    }
}

/// Catalog manager for reading and editing owners' rate sheets in storage
pub struct CatalogManager<S: RateSheetStore> {
    pub(crate) storage: S,
    validator: Box<dyn ChargeValidator>,
}

impl<S: RateSheetStore> CatalogManager<S> {
    /// Create a new catalog manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultChargeValidator),
        }
    }

    /// Create a new catalog manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn ChargeValidator>) -> Self {
        Self { storage, validator }
    }

    /// Catalog of an owner, empty when the owner has none
    pub async fn catalog(&self, owner: &OwnerKey) -> FeeResult<ChargeCatalog> {
        Ok(self.storage.get(owner).await?.unwrap_or_default())
    }

    /// Catalog of an owner, failing when the owner has none
    pub async fn catalog_required(&self, owner: &OwnerKey) -> FeeResult<ChargeCatalog> {
        self.storage
            .get(owner)
            .await?
            .ok_or_else(|| FeeError::Storage(format!("No rate sheet stored for {owner}")))
    }

    /// Seed an owner with the default zero-rated platforms if it has no sheet yet
    pub async fn ensure_defaults(&mut self, owner: &OwnerKey) -> FeeResult<ChargeCatalog> {
        if let Some(existing) = self.storage.get(owner).await? {
            return Ok(existing);
        }

        let catalog = ChargeCatalog::with_default_platforms();
        self.storage.put(owner, catalog.clone()).await?;
        info!(%owner, "seeded default rate sheet");
        Ok(catalog)
    }

    /// Add an entry to an owner's catalog
    pub async fn add_charge(&mut self, owner: &OwnerKey, entry: PlatformCharge) -> FeeResult<()> {
        let mut catalog = self.catalog(owner).await?;
        catalog.add_validated(entry, self.validator.as_ref())?;
        self.storage.put(owner, catalog).await
    }

    /// Replace the tiers of an entry in an owner's catalog
    pub async fn update_charge(
        &mut self,
        owner: &OwnerKey,
        entry: PlatformCharge,
    ) -> FeeResult<()> {
        self.validator.validate_charge(&entry)?;
        let mut catalog = self.catalog_required(owner).await?;
        catalog.update(entry)?;
        self.storage.put(owner, catalog).await
    }

    /// Delete an entry from an owner's catalog
    pub async fn delete_charge(
        &mut self,
        owner: &OwnerKey,
        platform_type: &str,
        payment_mode: &str,
    ) -> FeeResult<PlatformCharge> {
        let mut catalog = self.catalog(owner).await?;
        let removed = catalog.delete(platform_type, payment_mode)?;
        self.storage.put(owner, catalog).await?;
        Ok(removed)
    }
}
