use super::StagingError;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;

const RANDOM_SUFFIX_LEN: usize = 10;

/// Where the uploads of one submit land: `{bucket}` / `{prefix}/{owner}/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    bucket: String,
    prefix: String,
    owner_id: String,
}

impl UploadTarget {
    /// Fails with `MissingOwner` when there is no authenticated identity to namespace by
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        owner_id: Option<&str>,
    ) -> Result<Self, StagingError> {
        let owner_id = owner_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(StagingError::MissingOwner)?;

        Ok(Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            owner_id: owner_id.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// `{prefix}/{owner}/{unix micros}-{random}.{ext}`
    ///
    /// The owner segment keeps users apart; timestamp plus random suffix keeps two
    /// uploads by the same owner apart even within the same microsecond.
    pub fn object_path(&self, extension: &str) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LEN)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        let stem = format!(
            "{}/{}-{}",
            self.owner_id,
            Utc::now().timestamp_micros(),
            suffix
        );
        let name = if extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, extension)
        };

        if self.prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}
