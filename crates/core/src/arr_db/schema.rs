//! Per-version layouts of the content manager's own database.
//!
//! Each variant knows the column set of its primary content table and how to
//! select one row of it by id. The variant is chosen once, from the major
//! version reported by the running instance.

use crate::config::ArrKind;

/// Column-set capability for one schema version.
pub trait ArrSchema: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ArrKind;

    fn label(&self) -> &'static str;

    /// SELECT list plus FROM clause for the primary content table, yielding
    /// the column order expected by the row mappers.
    fn primary_select(&self) -> &'static str;

    /// Fetch one primary row by id.
    fn by_id_query(&self) -> String {
        let alias = match self.kind() {
            ArrKind::Sonarr => "s",
            ArrKind::Radarr => "m",
        };
        format!("{} WHERE {}.Id = ?1", self.primary_select(), alias)
    }
}

/// Sonarr v3: `Series` has no `LastAired` column.
#[derive(Debug, Clone, Copy)]
pub struct SonarrV3;

/// Sonarr v4+.
#[derive(Debug, Clone, Copy)]
pub struct SonarrV4;

/// Radarr v4: quality profile lives in `Movies.ProfileId`.
#[derive(Debug, Clone, Copy)]
pub struct RadarrV4;

/// Radarr v5+: renamed to `Movies.QualityProfileId`.
#[derive(Debug, Clone, Copy)]
pub struct RadarrV5;

impl ArrSchema for SonarrV3 {
    fn kind(&self) -> ArrKind {
        ArrKind::Sonarr
    }

    fn label(&self) -> &'static str {
        "sonarr-v3"
    }

    fn primary_select(&self) -> &'static str {
        "SELECT s.Id, s.Title, s.Monitored, s.TvdbId, s.ImdbId, s.Added, NULL FROM Series s"
    }
}

impl ArrSchema for SonarrV4 {
    fn kind(&self) -> ArrKind {
        ArrKind::Sonarr
    }

    fn label(&self) -> &'static str {
        "sonarr-v4"
    }

    fn primary_select(&self) -> &'static str {
        "SELECT s.Id, s.Title, s.Monitored, s.TvdbId, s.ImdbId, s.Added, s.LastAired FROM Series s"
    }
}

impl ArrSchema for RadarrV4 {
    fn kind(&self) -> ArrKind {
        ArrKind::Radarr
    }

    fn label(&self) -> &'static str {
        "radarr-v4"
    }

    fn primary_select(&self) -> &'static str {
        "SELECT m.Id, m.Monitored, m.MovieFileId, m.MinimumAvailability, m.ProfileId, m.Added, \
         mm.TmdbId, mm.ImdbId, mm.Title, mm.Year, mm.InCinemas, mm.DigitalRelease, mm.PhysicalRelease \
         FROM Movies m JOIN MovieMetadata mm ON m.MovieMetadataId = mm.Id"
    }
}

impl ArrSchema for RadarrV5 {
    fn kind(&self) -> ArrKind {
        ArrKind::Radarr
    }

    fn label(&self) -> &'static str {
        "radarr-v5"
    }

    fn primary_select(&self) -> &'static str {
        "SELECT m.Id, m.Monitored, m.MovieFileId, m.MinimumAvailability, m.QualityProfileId, m.Added, \
         mm.TmdbId, mm.ImdbId, mm.Title, mm.Year, mm.InCinemas, mm.DigitalRelease, mm.PhysicalRelease \
         FROM Movies m JOIN MovieMetadata mm ON m.MovieMetadataId = mm.Id"
    }
}

/// Pick the schema variant for a detected major version.
pub fn select_schema(kind: ArrKind, major: u32) -> Box<dyn ArrSchema> {
    match (kind, major) {
        (ArrKind::Sonarr, 0..=3) => Box::new(SonarrV3),
        (ArrKind::Sonarr, _) => Box::new(SonarrV4),
        (ArrKind::Radarr, 0..=4) => Box::new(RadarrV4),
        (ArrKind::Radarr, _) => Box::new(RadarrV5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_schema() {
        assert_eq!(select_schema(ArrKind::Sonarr, 3).label(), "sonarr-v3");
        assert_eq!(select_schema(ArrKind::Sonarr, 4).label(), "sonarr-v4");
        assert_eq!(select_schema(ArrKind::Sonarr, 5).label(), "sonarr-v4");
        assert_eq!(select_schema(ArrKind::Radarr, 4).label(), "radarr-v4");
        assert_eq!(select_schema(ArrKind::Radarr, 5).label(), "radarr-v5");
        assert_eq!(select_schema(ArrKind::Radarr, 6).label(), "radarr-v5");
    }

    #[test]
    fn test_by_id_query_uses_table_alias() {
        assert!(RadarrV5.by_id_query().ends_with("WHERE m.Id = ?1"));
        assert!(SonarrV3.by_id_query().ends_with("WHERE s.Id = ?1"));
    }
}
