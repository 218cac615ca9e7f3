//! Google Maps resolver
//!
//! Locations are parsed straight from the shared link or `geo:` URI. With a
//! Maps key configured the address is reverse-geocoded, and links that name
//! a place without coordinates are forward-geocoded. The static-map preview
//! never embeds the key; the renderer adds it when drawing.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use chrono::Utc;
use core_messages::{ContentFragment, MapLocation, MediaInfo, MediaProvider, Message};
use core_runtime::config::ProviderApiConfig;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use super::{ensure_provider, MediaResolver, ProviderHttp};
use crate::error::{MediaError, Result};

const GEOCODING_API_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const DEFAULT_ZOOM: u8 = 15;
const MAX_ZOOM: u8 = 21;
const PREVIEW_SIZE: &str = "600x300";

pub struct GoogleMapsResolver {
    http: ProviderHttp,
    api_key: Option<String>,
    geocoding_url: String,
    static_map_base_url: String,
}

/// What a maps link or `geo:` URI tells us about a location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationLink {
    pub coordinates: Option<(f64, f64)>,
    pub zoom: Option<u8>,
    /// Place name or free-text search
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleMapsResolver {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: Option<String>,
        config: &ProviderApiConfig,
    ) -> Self {
        Self {
            http: ProviderHttp::new(MediaProvider::GoogleMaps, http_client, config),
            api_key,
            geocoding_url: GEOCODING_API_URL.to_string(),
            static_map_base_url: config.static_map_base_url.clone(),
        }
    }

    /// Works without a key; geocoding is skipped in that case.
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ProviderApiConfig) -> Self {
        Self::new(http_client, config.google_maps_api_key.clone(), config)
    }

    pub fn with_geocoding_url(mut self, url: impl Into<String>) -> Self {
        self.geocoding_url = url.into();
        self
    }

    fn preview_url(&self, latitude: f64, longitude: f64, zoom: u8) -> Result<Url> {
        let center = format!("{},{}", latitude, longitude);
        Url::parse_with_params(
            &self.static_map_base_url,
            &[
                ("center", center.as_str()),
                ("zoom", zoom.to_string().as_str()),
                ("size", PREVIEW_SIZE),
                ("markers", center.as_str()),
            ],
        )
        .map_err(|e| MediaError::Internal(format!("static map base URL: {}", e)))
    }

    #[instrument(skip(self, api_key, param))]
    async fn geocode(&self, api_key: &str, param: (&str, &str)) -> Result<Option<GeocodeResult>> {
        let request = HttpRequest::get(&self.geocoding_url)
            .query(param.0, param.1)
            .query("key", api_key);

        let response: GeocodeResponse = self.http.get_json(request).await?;
        let detail = || response.error_message.clone().unwrap_or_else(|| response.status.clone());

        match response.status.as_str() {
            "OK" => Ok(response.results.into_iter().next()),
            "ZERO_RESULTS" => Ok(None),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(MediaError::RateLimited {
                provider: MediaProvider::GoogleMaps,
                retry_after: None,
            }),
            "REQUEST_DENIED" => Err(MediaError::Unauthorized(format!(
                "Geocoding request denied: {}",
                detail()
            ))),
            "INVALID_REQUEST" => Err(MediaError::InvalidReference(format!(
                "Geocoding rejected the location: {}",
                detail()
            ))),
            _ => Err(MediaError::Network(format!("Geocoding failed: {}", detail()))),
        }
    }

    async fn resolve_link(&self, link: LocationLink) -> Result<MapLocation> {
        let (latitude, longitude, address) = match (link.coordinates, &self.api_key) {
            (Some((lat, lng)), Some(key)) => {
                let latlng = format!("{},{}", lat, lng);
                let address = self
                    .geocode(key, ("latlng", latlng.as_str()))
                    .await?
                    .map(|result| result.formatted_address);
                (lat, lng, address)
            }
            (Some((lat, lng)), None) => (lat, lng, None),
            (None, Some(key)) => {
                let query = link.name.as_deref().unwrap_or_default();
                let result = self
                    .geocode(key, ("address", query))
                    .await?
                    .ok_or_else(|| MediaError::NotFound(format!("no place matches '{}'", query)))?;
                let location = result.geometry.map(|g| g.location).ok_or_else(|| {
                    MediaError::Parse(format!("geocoding result for '{}' has no geometry", query))
                })?;
                (location.lat, location.lng, Some(result.formatted_address))
            }
            (None, None) => {
                return Err(MediaError::NotConfigured(
                    "Google Maps API key is required to locate places by name".to_string(),
                ))
            }
        };

        let zoom = link.zoom.unwrap_or(DEFAULT_ZOOM);
        debug!(latitude, longitude, zoom, "Resolved map location");

        Ok(MapLocation {
            latitude,
            longitude,
            zoom: link.zoom,
            name: link.name,
            address,
            preview_url: Some(self.preview_url(latitude, longitude, zoom)?.to_string()),
            refreshed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl MediaResolver for GoogleMapsResolver {
    fn provider(&self) -> MediaProvider {
        MediaProvider::GoogleMaps
    }

    async fn update_media(
        &self,
        _message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment> {
        ensure_provider(MediaProvider::GoogleMaps, fragment)?;

        let link = parse_location_link(&fragment.content).ok_or_else(|| {
            MediaError::InvalidReference(format!(
                "no location in '{}'; short links must be expanded first",
                fragment.content
            ))
        })?;

        let location = self.resolve_link(link).await?;
        Ok(fragment.clone().with_media(MediaInfo::Location(location)))
    }
}

// =============================================================================
// Link Parsing
// =============================================================================

/// Parse a Google Maps link or `geo:` URI.
///
/// Returns `None` when the payload carries neither coordinates nor a place
/// name (short links such as `maps.app.goo.gl/...` fall in this group).
pub fn parse_location_link(payload: &str) -> Option<LocationLink> {
    let url = Url::parse(payload.trim()).ok()?;
    if url.scheme() == "geo" {
        return parse_geo_uri(&url);
    }

    let mut link = LocationLink {
        coordinates: None,
        zoom: None,
        name: None,
    };

    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.collect();
        for (i, segment) in segments.iter().enumerate() {
            if let Some(view) = segment.strip_prefix('@') {
                link.coordinates = parse_coordinates(view);
                link.zoom = view.split(',').skip(2).find_map(parse_zoom);
            } else if *segment == "place" || *segment == "search" {
                link.name = segments.get(i + 1).and_then(|s| decode_place(s));
            }
        }
    }

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "q" | "query" | "ll" | "center" | "destination" => match parse_coordinates(&value) {
                Some(coordinates) => link.coordinates = link.coordinates.or(Some(coordinates)),
                None if !value.trim().is_empty() && link.name.is_none() => {
                    link.name = Some(value.trim().to_string())
                }
                None => {}
            },
            "z" | "zoom" => link.zoom = link.zoom.or_else(|| parse_zoom(&value)),
            _ => {}
        }
    }

    (link.coordinates.is_some() || link.name.is_some()).then_some(link)
}

/// `geo:lat,lng[,alt][;params][?q=...&z=...]`
fn parse_geo_uri(url: &Url) -> Option<LocationLink> {
    let path = url.path().split(';').next().unwrap_or_default();
    let mut coordinates = parse_coordinates(path);
    let mut zoom = None;
    let mut name = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "z" => zoom = parse_zoom(&value),
            "q" => {
                // geo:0,0?q=lat,lng(Label)
                let (query, label) = match value.split_once('(') {
                    Some((query, label)) => (query, Some(label.trim_end_matches(')'))),
                    None => (value.as_ref(), None),
                };
                match parse_coordinates(query) {
                    Some(q) if coordinates.map_or(true, |c| c == (0.0, 0.0)) => {
                        coordinates = Some(q)
                    }
                    Some(_) => {}
                    None if !query.trim().is_empty() => name = Some(query.trim().to_string()),
                    None => {}
                }
                if let Some(label) = label.filter(|l| !l.trim().is_empty()) {
                    name = Some(label.trim().to_string());
                }
            }
            _ => {}
        }
    }

    (coordinates.is_some() || name.is_some()).then_some(LocationLink {
        coordinates,
        zoom,
        name,
    })
}

fn parse_coordinates(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let latitude: f64 = parts.next()?.trim().parse().ok()?;
    let longitude: f64 = parts.next()?.trim().parse().ok()?;

    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    valid.then_some((latitude, longitude))
}

/// `17z`, `17.5z` or a bare `17`
fn parse_zoom(value: &str) -> Option<u8> {
    let number = value.trim().strip_suffix('z').unwrap_or(value.trim());
    let zoom: f64 = number.parse().ok()?;
    (zoom.is_finite() && zoom >= 0.0).then(|| (zoom as u8).min(MAX_ZOOM))
}

fn decode_place(segment: &str) -> Option<String> {
    let spaced = segment.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).ok()?;
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}
