// src/common/geo.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

// Um ponto geográfico (latitude/longitude em graus, WGS 84).
// No banco ele vive como GEOGRAPHY(POINT, 4326); aqui trafega como struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = -26.2041)]
    pub latitude: f64,
    #[schema(example = 28.0473)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    // Faixas inclusivas: (90, 180) é válido, (91, 0) não.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::BadRequest(format!(
                "Latitude fora do intervalo [-90, 90]: {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::BadRequest(format!(
                "Longitude fora do intervalo [-180, 180]: {}",
                self.longitude
            )));
        }
        Ok(())
    }

    // Serializa no formato que o PostGIS aceita em ST_GeogFromText.
    // Atenção à ordem: WKT é POINT(lon lat), não (lat lon).
    pub fn to_wkt(&self) -> String {
        format!("SRID=4326;POINT({} {})", self.longitude, self.latitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

// Faz o caminho inverso de to_wkt. Aceita com e sem o prefixo "SRID=4326;",
// porque ST_AsText devolve sem e ST_AsEWKT devolve com.
pub fn parse_wkt_point(input: &str) -> Result<GeoPoint, AppError> {
    let trimmed = input.trim();

    let body = match trimmed.split_once(';') {
        Some((prefix, rest)) if prefix.to_ascii_uppercase().starts_with("SRID=") => rest,
        _ => trimmed,
    };

    let body = body.trim();
    let upper = body.to_ascii_uppercase();
    if !upper.starts_with("POINT") {
        return Err(AppError::BadRequest(format!(
            "Geometria não suportada (esperado POINT): {}",
            input
        )));
    }

    let open = body.find('(');
    let close = body.rfind(')');
    let (open, close) = match (open, close) {
        (Some(o), Some(c)) if c > o => (o, c),
        _ => {
            return Err(AppError::BadRequest(format!(
                "WKT malformado: {}",
                input
            )));
        }
    };

    let mut coords = body[open + 1..close].split_whitespace();
    let lon = coords
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| AppError::BadRequest(format!("WKT malformado: {}", input)))?;
    let lat = coords
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| AppError::BadRequest(format!("WKT malformado: {}", input)))?;

    GeoPoint::new(lat, lon)
}

// Os clientes mandam localização em três formatos diferentes:
// string WKT, objeto {latitude, longitude} ou GeoJSON Point.
// Normaliza tudo para GeoPoint.
pub fn parse_point_value(value: &serde_json::Value) -> Result<GeoPoint, AppError> {
    match value {
        serde_json::Value::String(wkt) => parse_wkt_point(wkt),

        serde_json::Value::Object(map) => {
            if let (Some(lat), Some(lon)) = (
                map.get("latitude").and_then(|v| v.as_f64()),
                map.get("longitude").and_then(|v| v.as_f64()),
            ) {
                return GeoPoint::new(lat, lon);
            }

            // GeoJSON: {"type": "Point", "coordinates": [lon, lat]}
            if map.get("type").and_then(|v| v.as_str()) == Some("Point") {
                if let Some(coords) = map.get("coordinates").and_then(|v| v.as_array()) {
                    if let (Some(lon), Some(lat)) = (
                        coords.first().and_then(|v| v.as_f64()),
                        coords.get(1).and_then(|v| v.as_f64()),
                    ) {
                        return GeoPoint::new(lat, lon);
                    }
                }
            }

            Err(AppError::BadRequest(
                "Localização em formato não reconhecido.".to_string(),
            ))
        }

        _ => Err(AppError::BadRequest(
            "Localização em formato não reconhecido.".to_string(),
        )),
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_km(a, b) * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_ewkt_with_srid_prefix() {
        let point = parse_wkt_point("SRID=4326;POINT(28.0473 -26.2041)").unwrap();
        assert!((point.latitude - (-26.2041)).abs() < 1e-9);
        assert!((point.longitude - 28.0473).abs() < 1e-9);
    }

    #[test]
    fn parse_wkt_without_srid_prefix() {
        let point = parse_wkt_point("POINT(-46.6333 -23.5505)").unwrap();
        assert!((point.latitude - (-23.5505)).abs() < 1e-9);
        assert!((point.longitude - (-46.6333)).abs() < 1e-9);
    }

    #[test]
    fn wkt_round_trip_preserves_coordinates() {
        let original = GeoPoint::new(-26.2041, 28.0473).unwrap();
        let parsed = parse_wkt_point(&original.to_wkt()).unwrap();
        assert!((parsed.latitude - original.latitude).abs() < 1e-6);
        assert!((parsed.longitude - original.longitude).abs() < 1e-6);
    }

    #[test]
    fn parse_object_and_geojson_forms() {
        let from_object =
            parse_point_value(&json!({"latitude": -26.2041, "longitude": 28.0473})).unwrap();
        assert!((from_object.latitude - (-26.2041)).abs() < 1e-9);

        let from_geojson = parse_point_value(&json!({
            "type": "Point",
            "coordinates": [28.0473, -26.2041]
        }))
        .unwrap();
        assert!((from_geojson.latitude - (-26.2041)).abs() < 1e-9);
        assert!((from_geojson.longitude - 28.0473).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 181.0).is_err());
        assert!(GeoPoint::new(-91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
    }

    #[test]
    fn accepts_inclusive_boundaries() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 1.0).unwrap();
        let distance = haversine_km(&a, &b);
        assert!((distance - 111.2).abs() < 1.0);
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(-23.5505, -46.6333).unwrap();
        assert!(haversine_km(&p, &p) < 1e-9);
    }
}
