//! Production store client. One PostGIS-backed table: the document as jsonb,
//! its canonical geometry text under a unique constraint, and a GiST-indexed
//! geography column the KNN operator ranks against.

use async_trait::async_trait;
use geo_types::Point;
use geojson::{FeatureCollection, Geometry};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::debug;

use super::{GeoStore, StoreError};
use crate::track_geo::canonical_geometry;

const INSERT: &str = "insert into tracks (document, canonical_geometry, geometry) \
     values ($1, $2, ST_GeomFromGeoJSON($3)::geography)";

const NEAREST: &str = "select document from tracks \
     order by geometry <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography \
     limit $3";

pub struct PgTrackStore {
    pool: PgPool,
}

impl PgTrackStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    /// Create the documents table and its indexes if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        // The extension is usually installed by the database administrator;
        // failing to create it here is only fatal if the table DDL below
        // fails too.
        if let Err(err) = sqlx::query("create extension if not exists postgis")
            .execute(&self.pool)
            .await
        {
            debug!(error = %err, "could not create postgis extension");
        }
        sqlx::query(
            "create table if not exists tracks (\
                 id bigserial primary key, \
                 document jsonb not null, \
                 canonical_geometry text not null unique, \
                 geometry geography not null)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        sqlx::query("create index if not exists tracks_geometry_idx on tracks using gist (geometry)")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Drain the pool. Called once at shutdown, after the server has stopped
    /// accepting requests.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl GeoStore for PgTrackStore {
    async fn insert(&self, document: &FeatureCollection) -> Result<(), StoreError> {
        let canonical = canonical_geometry(document)?;
        let geometries: Vec<Geometry> = document
            .features
            .iter()
            .filter_map(|feature| feature.geometry.clone())
            .collect();
        let aggregate = Geometry::new(geojson::Value::GeometryCollection(geometries));
        sqlx::query(INSERT)
            .bind(serde_json::to_value(document)?)
            .bind(&canonical)
            .bind(serde_json::to_string(&aggregate)?)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_nearest(
        &self,
        origin: Point<f64>,
        limit: usize,
    ) -> Result<Vec<FeatureCollection>, StoreError> {
        let rows = sqlx::query(NEAREST)
            .bind(origin.x())
            .bind(origin.y())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|row| {
                let document: serde_json::Value =
                    row.try_get("document").map_err(map_sqlx_error)?;
                Ok(serde_json::from_value(document)?)
            })
            .collect()
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StoreError::DuplicateGeometry;
        }
    }
    StoreError::Backend(err.to_string())
}
