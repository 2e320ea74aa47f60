//! Closed registry of managed service types.
//!
//! The dynamic lookup-by-name of earlier tooling is replaced with a
//! compile-time-checked enum: unknown service names in the cluster
//! document are rejected at load time, not at dispatch time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SpecError;

/// Document key for the management/monitoring service, which is deployed
/// through a dedicated control-plane endpoint rather than the generic
/// service lifecycle.
pub const MGMT_SERVICE_KEY: &str = "MGMT";

/// Services started first, one at a time and strictly in this order.
/// Later services depend on artifacts these create (directories, znodes).
pub const BASE_SERVICES: &[ServiceType] =
    &[ServiceType::Zookeeper, ServiceType::Hdfs, ServiceType::Yarn];

/// Remaining services, started as a batch after the base set.
pub const ADDITIONAL_SERVICES: &[ServiceType] = &[
    ServiceType::SparkOnYarn,
    ServiceType::Hbase,
    ServiceType::Hive,
    ServiceType::Impala,
    ServiceType::Flume,
    ServiceType::Oozie,
    ServiceType::Sqoop,
    ServiceType::Solr,
    ServiceType::Kafka,
    ServiceType::Sentry,
    ServiceType::Hue,
];

/// A managed service type known to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Zookeeper,
    Hdfs,
    Yarn,
    SparkOnYarn,
    Hbase,
    Hive,
    Impala,
    Flume,
    Oozie,
    Sqoop,
    Solr,
    Kafka,
    Sentry,
    Hue,
}

impl ServiceType {
    /// Control-plane name for this service. Doubles as the service
    /// entity name within the cluster and as the API service type.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceType::Zookeeper => "ZOOKEEPER",
            ServiceType::Hdfs => "HDFS",
            ServiceType::Yarn => "YARN",
            ServiceType::SparkOnYarn => "SPARK_ON_YARN",
            ServiceType::Hbase => "HBASE",
            ServiceType::Hive => "HIVE",
            ServiceType::Impala => "IMPALA",
            ServiceType::Flume => "FLUME",
            ServiceType::Oozie => "OOZIE",
            ServiceType::Sqoop => "SQOOP",
            ServiceType::Solr => "SOLR",
            ServiceType::Kafka => "KAFKA",
            ServiceType::Sentry => "SENTRY",
            ServiceType::Hue => "HUE",
        }
    }

    /// All known service types, in start order (base set first).
    pub fn all() -> impl Iterator<Item = ServiceType> {
        BASE_SERVICES.iter().chain(ADDITIONAL_SERVICES).copied()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ZOOKEEPER" => Ok(ServiceType::Zookeeper),
            "HDFS" => Ok(ServiceType::Hdfs),
            "YARN" => Ok(ServiceType::Yarn),
            "SPARK_ON_YARN" => Ok(ServiceType::SparkOnYarn),
            "HBASE" => Ok(ServiceType::Hbase),
            "HIVE" => Ok(ServiceType::Hive),
            "IMPALA" => Ok(ServiceType::Impala),
            "FLUME" => Ok(ServiceType::Flume),
            "OOZIE" => Ok(ServiceType::Oozie),
            "SQOOP" => Ok(ServiceType::Sqoop),
            "SOLR" => Ok(ServiceType::Solr),
            "KAFKA" => Ok(ServiceType::Kafka),
            "SENTRY" => Ok(ServiceType::Sentry),
            "HUE" => Ok(ServiceType::Hue),
            other => Err(SpecError::UnknownService(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_types() {
        assert_eq!("ZOOKEEPER".parse::<ServiceType>().unwrap(), ServiceType::Zookeeper);
        assert_eq!("hdfs".parse::<ServiceType>().unwrap(), ServiceType::Hdfs);
        assert_eq!(
            "Spark_On_Yarn".parse::<ServiceType>().unwrap(),
            ServiceType::SparkOnYarn
        );
    }

    #[test]
    fn parse_unknown_type_fails() {
        let err = "FOOBAR".parse::<ServiceType>().unwrap_err();
        assert!(matches!(err, SpecError::UnknownService(_)));
    }

    #[test]
    fn name_round_trips() {
        for ty in ServiceType::all() {
            assert_eq!(ty.name().parse::<ServiceType>().unwrap(), ty);
        }
    }

    #[test]
    fn base_services_ordered() {
        assert_eq!(
            BASE_SERVICES,
            &[ServiceType::Zookeeper, ServiceType::Hdfs, ServiceType::Yarn]
        );
    }

    #[test]
    fn all_covers_every_type_once() {
        let all: Vec<_> = ServiceType::all().collect();
        assert_eq!(all.len(), 14);
        let mut dedup = all.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), all.len());
    }
}
