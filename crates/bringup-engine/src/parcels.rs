//! Parcel distribution — brings a versioned software bundle through
//! download, distribution, and activation across the fleet.
//!
//! The control plane owns the parcel's stage machine and advances it
//! asynchronously; this module triggers transitions and polls for
//! arrival. Accepting stage sets are forward-inclusive so a re-run
//! that finds the parcel further along treats that as success.

use tracing::{debug, info};

use bringup_api::{ControlPlane, ParcelInfo, ParcelStage, REMOTE_PARCEL_REPO_URLS};
use bringup_spec::ParcelSpec;

use crate::error::{EngineError, EngineResult};
use crate::retry::{Outcome, RetryTunings};

const DOWNLOAD_ACCEPT: &[ParcelStage] = &[
    ParcelStage::Downloaded,
    ParcelStage::Distributed,
    ParcelStage::Activated,
    ParcelStage::InUse,
];
const DISTRIBUTE_ACCEPT: &[ParcelStage] = &[
    ParcelStage::Distributed,
    ParcelStage::Activated,
    ParcelStage::InUse,
];
const ACTIVATE_ACCEPT: &[ParcelStage] = &[ParcelStage::Activated, ParcelStage::InUse];

/// Drives one parcel to the ACTIVATED stage.
pub struct ParcelDistributor<'a, C: ControlPlane> {
    api: &'a C,
    cluster: &'a str,
    product: String,
    version: String,
    repo: Option<String>,
    tunings: &'a RetryTunings,
}

impl<'a, C: ControlPlane> ParcelDistributor<'a, C> {
    pub fn new(api: &'a C, cluster: &'a str, spec: &ParcelSpec, tunings: &'a RetryTunings) -> Self {
        Self {
            api,
            cluster,
            product: spec.product.clone(),
            version: spec.version.clone(),
            repo: spec.repo.clone(),
            tunings,
        }
    }

    /// Validate availability, then download, distribute, and activate.
    /// Safe to re-run at any point in the pipeline.
    pub async fn ensure_activated(&self) -> EngineResult<()> {
        self.validate().await?;
        self.download().await?;
        self.distribute().await?;
        self.activate().await?;
        Ok(())
    }

    /// Confirm some configured repository serves the requested version.
    ///
    /// When the lookup misses and an alternate repository was supplied,
    /// append it to the control plane's repository list (comma-joined)
    /// and retry the lookup; without an alternate repository the miss
    /// is fatal.
    pub async fn validate(&self) -> EngineResult<()> {
        match self.fetch().await {
            Ok(parcel) => self.check_errors(&parcel),
            Err(EngineError::Api(err)) if err.is_not_found() => {
                let Some(repo) = self.repo.clone() else {
                    return Err(EngineError::MissingParcelRepo {
                        product: self.product.clone(),
                        version: self.version.clone(),
                    });
                };

                info!(stage = "PARCELS", repo = %repo, "adding parcel repository");
                let current = self.api.get_config_value(REMOTE_PARCEL_REPO_URLS).await?;
                let joined = match current.effective() {
                    Some(base) if !base.is_empty() => format!("{base},{repo}"),
                    _ => repo.clone(),
                };
                self.api
                    .update_config_value(REMOTE_PARCEL_REPO_URLS, &joined)
                    .await?;

                let parcel = self
                    .tunings
                    .parcel_validate
                    .run(|| async move {
                        match self.fetch().await {
                            Ok(parcel) => Outcome::Done(parcel),
                            Err(EngineError::Api(err)) if err.is_not_found() => {
                                Outcome::Transient(err.into())
                            }
                            Err(err) => Outcome::Fatal(err),
                        }
                    })
                    .await?;
                self.check_errors(&parcel)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn download(&self) -> EngineResult<()> {
        if self.already_at(DOWNLOAD_ACCEPT).await? {
            return Ok(());
        }
        info!(
            stage = "PARCELS",
            product = %self.product,
            version = %self.version,
            "downloading parcel"
        );
        self.api
            .start_parcel_download(self.cluster, &self.product, &self.version)
            .await?;
        self.await_stage(ParcelStage::Downloaded, DOWNLOAD_ACCEPT).await
    }

    pub async fn distribute(&self) -> EngineResult<()> {
        if self.already_at(DISTRIBUTE_ACCEPT).await? {
            return Ok(());
        }
        info!(
            stage = "PARCELS",
            product = %self.product,
            version = %self.version,
            "distributing parcel"
        );
        self.api
            .start_parcel_distribution(self.cluster, &self.product, &self.version)
            .await?;
        self.await_stage(ParcelStage::Distributed, DISTRIBUTE_ACCEPT).await
    }

    pub async fn activate(&self) -> EngineResult<()> {
        if self.already_at(ACTIVATE_ACCEPT).await? {
            return Ok(());
        }
        info!(
            stage = "PARCELS",
            product = %self.product,
            version = %self.version,
            "activating parcel"
        );
        self.api
            .activate_parcel(self.cluster, &self.product, &self.version)
            .await?;
        self.await_stage(ParcelStage::Activated, ACTIVATE_ACCEPT).await
    }

    /// A prior run may have carried the parcel past this step already;
    /// in that case the trigger must not be re-issued.
    async fn already_at(&self, accept: &[ParcelStage]) -> EngineResult<bool> {
        let parcel = self.fetch().await?;
        self.check_errors(&parcel)?;
        if accept.contains(&parcel.stage) {
            debug!(
                stage = "PARCELS",
                product = %self.product,
                current = %parcel.stage,
                "parcel already past this stage"
            );
            return Ok(true);
        }
        Ok(false)
    }

    async fn await_stage(&self, want: ParcelStage, accept: &'static [ParcelStage]) -> EngineResult<()> {
        self.tunings
            .parcel_poll
            .run(|| async move {
                let parcel = match self.fetch().await {
                    Ok(parcel) => parcel,
                    Err(err) => return Outcome::Fatal(err),
                };
                if let Err(err) = self.check_errors(&parcel) {
                    return Outcome::Fatal(err);
                }
                if accept.contains(&parcel.stage) {
                    return Outcome::Done(());
                }
                info!(
                    stage = "PARCELS",
                    product = %self.product,
                    version = %self.version,
                    want = %want,
                    progress = parcel.progress,
                    total = parcel.total_progress,
                    "waiting on parcel stage"
                );
                Outcome::Transient(EngineError::ParcelNotReady {
                    product: self.product.clone(),
                    version: self.version.clone(),
                    want: want.to_string(),
                })
            })
            .await
    }

    async fn fetch(&self) -> EngineResult<ParcelInfo> {
        Ok(self
            .api
            .get_parcel(self.cluster, &self.product, &self.version)
            .await?)
    }

    /// A non-empty parcel error set is terminal.
    fn check_errors(&self, parcel: &ParcelInfo) -> EngineResult<()> {
        if parcel.errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ParcelErrors {
                product: self.product.clone(),
                version: self.version.clone(),
                errors: parcel.errors.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bringup_api::testing::FakeControlPlane;
    use bringup_api::REMOTE_PARCEL_REPO_URLS;

    fn spec(repo: Option<&str>) -> ParcelSpec {
        ParcelSpec {
            product: "CDH".to_string(),
            version: "5.6.0".to_string(),
            repo: repo.map(|r| r.to_string()),
        }
    }

    fn tunings() -> RetryTunings {
        RetryTunings::immediate()
    }

    #[tokio::test]
    async fn full_pipeline_reaches_activated() {
        let fake = FakeControlPlane::new();
        fake.add_parcel("c", "CDH", "5.6.0", ParcelStage::AvailableRemotely);
        let tunings = tunings();
        let spec = spec(None);
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        distributor.ensure_activated().await.unwrap();

        assert_eq!(fake.parcel_stage("c", "CDH", "5.6.0"), Some(ParcelStage::Activated));
        let triggers: Vec<_> = fake
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("parcel_"))
            .collect();
        assert_eq!(
            triggers,
            vec![
                "parcel_download CDH-5.6.0",
                "parcel_distribute CDH-5.6.0",
                "parcel_activate CDH-5.6.0",
            ]
        );
    }

    #[tokio::test]
    async fn distribute_on_activated_parcel_does_not_retrigger() {
        let fake = FakeControlPlane::new();
        fake.add_parcel("c", "CDH", "5.6.0", ParcelStage::Activated);
        let tunings = tunings();
        let spec = spec(None);
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        distributor.distribute().await.unwrap();

        assert!(fake.calls_with_prefix("parcel_distribute").is_empty());
    }

    #[tokio::test]
    async fn stage_polling_converges_after_lag() {
        let fake = FakeControlPlane::new();
        fake.add_parcel("c", "CDH", "5.6.0", ParcelStage::AvailableRemotely);
        fake.set_parcel_transition_polls("c", "CDH", "5.6.0", 3);
        let tunings = tunings();
        let spec = spec(None);
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        distributor.download().await.unwrap();
        assert_eq!(fake.parcel_stage("c", "CDH", "5.6.0"), Some(ParcelStage::Downloaded));
    }

    #[tokio::test]
    async fn validate_without_repo_is_fatal() {
        let fake = FakeControlPlane::new();
        let tunings = tunings();
        let spec = spec(None);
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        let err = distributor.validate().await.unwrap_err();
        assert!(matches!(err, EngineError::MissingParcelRepo { .. }));
        assert!(err.to_string().contains("specify a parcel repo"));
        // No repository mutation was attempted.
        assert!(fake.calls_with_prefix("update_cm_config").is_empty());
    }

    #[tokio::test]
    async fn validate_appends_alternate_repo() {
        let fake = FakeControlPlane::new();
        fake.update_config_value(REMOTE_PARCEL_REPO_URLS, "http://existing")
            .await
            .unwrap();
        fake.add_parcel_behind_repo("c", "CDH", "5.6.0", ParcelStage::AvailableRemotely);
        let tunings = tunings();
        let spec = spec(Some("http://alternate"));
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        distributor.validate().await.unwrap();

        let value = fake
            .get_config_value(REMOTE_PARCEL_REPO_URLS)
            .await
            .unwrap();
        assert_eq!(value.effective(), Some("http://existing,http://alternate"));
    }

    #[tokio::test]
    async fn parcel_errors_abort_without_retry() {
        let fake = FakeControlPlane::new();
        fake.add_parcel("c", "CDH", "5.6.0", ParcelStage::Downloading);
        fake.set_parcel_errors("c", "CDH", "5.6.0", &["checksum mismatch on h2"]);
        let tunings = tunings();
        let spec = spec(None);
        let distributor = ParcelDistributor::new(&fake, "c", &spec, &tunings);

        let err = distributor.download().await.unwrap_err();
        assert!(matches!(err, EngineError::ParcelErrors { .. }));
        assert!(fake.calls_with_prefix("parcel_download").is_empty());
    }
}
