use std::fmt;

use shardci_metadata::ServiceSettings;

/// Identifies one unit of parallel execution.
///
/// Feature shards use their 1-based ordinal, the baseline run its configured name.
/// Ordering is plain string ordering, so `10` sorts before `2` and the baseline
/// sorts by its literal name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId(String);

impl ShardId {
    pub fn ordinal(ordinal: usize) -> Self {
        Self(ordinal.to_string())
    }

    pub fn baseline(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The build name and identifier every resource name is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    name: String,
    id: String,
}

impl BuildIdentity {
    /// The name is lower-cased, since it doubles as the image tag.
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            id: id.trim().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tag of the application image built for this run.
    pub fn image(&self) -> &str {
        &self.name
    }

    /// Container of the relational store shared by all shards.
    pub fn shared_database(&self) -> String {
        format!("{}-{}-db", self.name, self.id)
    }

    /// Names of everything `shard` may create.
    pub fn resources(&self, shard: &ShardId, services: &[ServiceSettings]) -> ShardResources {
        let sandbox = format!("{}-{}-{}", self.name, self.id, shard);
        let services = services
            .iter()
            .map(|service| format!("{sandbox}-{}", service.name))
            .collect();
        let database = format!("{}_{}_{}_test", self.name, self.id, shard).replace('-', "_");

        ShardResources {
            sandbox,
            services,
            database,
        }
    }
}

/// Uniquely named per-shard resources. Nothing here is shared between shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardResources {
    /// Container the test command runs in.
    pub sandbox: String,

    /// One container per configured backing service, in configuration order.
    pub services: Vec<String>,

    /// Database created for this shard inside the shared store.
    pub database: String,
}

impl ShardResources {
    /// Every container name, sandbox first.
    pub fn containers(&self) -> Vec<String> {
        std::iter::once(self.sandbox.clone())
            .chain(self.services.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use shardci_metadata::Options;

    use super::*;

    #[test]
    fn resource_names() {
        let settings = Options::default().to_settings().expect("defaults");
        let identity = BuildIdentity::new("Shop-Front", "1a2b3c4d");
        let resources = identity.resources(&ShardId::ordinal(3), settings.services());

        insta::assert_snapshot!(identity.shared_database(), @"shop-front-1a2b3c4d-db");
        insta::assert_snapshot!(resources.sandbox, @"shop-front-1a2b3c4d-3");
        insta::assert_snapshot!(resources.containers().join(" "), @"shop-front-1a2b3c4d-3 shop-front-1a2b3c4d-3-redis");
        insta::assert_snapshot!(resources.database, @"shop_front_1a2b3c4d_3_test");
    }

    #[test]
    fn shard_ids_sort_as_strings() {
        let mut ids = vec![
            ShardId::ordinal(2),
            ShardId::baseline("rspec"),
            ShardId::ordinal(10),
            ShardId::ordinal(1),
        ];
        ids.sort();

        let ids: Vec<_> = ids.iter().map(ShardId::as_str).collect();
        assert_eq!(ids, ["1", "10", "2", "rspec"]);
    }
}
