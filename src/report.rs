/*!
 * The records that flow through the pipeline.
 *
 * A [PositionReport] is a raw AIS broadcast after its columns have been typed. A [CleanedReport]
 * is a report that survived cleaning and represents one vessel sitting still at one place and
 * time. A [ClusterAssignment] pairs a cleaned report with the spatial cluster it was put in.
 */

use crate::geo::{BoundingBox, Coord, Geo};
use chrono::{DateTime, Utc};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The Maritime Mobile Service Identity of a vessel.
pub type VesselId = u32;

/// Label of a spatial cluster.
pub type ClusterId = i32;

/// The label given to a report that does not belong to any cluster.
pub const NOISE_CLUSTER_ID: ClusterId = -1;

/**
 * The navigational status a vessel reports about itself.
 *
 * The text forms are exactly what appears in the Danish Maritime Authority AIS dumps.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum NavigationalStatus {
    #[strum(serialize = "Under way using engine")]
    UnderWayUsingEngine,
    #[strum(serialize = "At anchor")]
    AtAnchor,
    #[strum(serialize = "Not under command")]
    NotUnderCommand,
    #[strum(serialize = "Restricted manoeuverability")]
    RestrictedManoeuverability,
    #[strum(serialize = "Constrained by her draught")]
    ConstrainedByDraught,
    #[strum(serialize = "Moored")]
    Moored,
    #[strum(serialize = "Aground")]
    Aground,
    #[strum(serialize = "Engaged in fishing")]
    EngagedInFishing,
    #[strum(serialize = "Under way sailing")]
    UnderWaySailing,
    #[strum(serialize = "Reserved for future amendment [HSC]")]
    ReservedHsc,
    #[strum(serialize = "Reserved for future amendment [WIG]")]
    ReservedWig,
    #[strum(serialize = "Power-driven vessel towing astern")]
    TowingAstern,
    #[strum(serialize = "Power-driven vessel pushing ahead or towing alongside")]
    PushingAheadOrTowingAlongside,
    #[strum(serialize = "Reserved for future use")]
    ReservedForFutureUse,
    #[strum(serialize = "AIS-SART")]
    AisSart,
    #[strum(serialize = "Unknown value")]
    Unknown,
}

impl NavigationalStatus {
    /// Parse the status text from a feed, `None` if it isn't one we know.
    pub fn from_feed_text(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    /// The text used for this status in the feeds.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /**
     * Is this a status a vessel uses when it is sitting still in or near a port?
     *
     * Only moored, anchored, and not under command vessels qualify. Other slow vessels, such as
     * those fishing or aground, are not evidence of a port.
     */
    pub fn is_stationary(&self) -> bool {
        use NavigationalStatus::*;

        matches!(self, Moored | AtAnchor | NotUnderCommand)
    }
}

/**
 * A raw position report with typed columns.
 *
 * Every field is optional, a value that was missing or failed to parse is `None`.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionReport {
    pub vessel_id: Option<VesselId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed over ground in knots.
    pub speed: Option<f64>,
    pub destination: Option<String>,
    /// Kept as text, statuses we don't recognize are still valid input, just not stationary.
    pub navigational_status: Option<String>,
}

/// A report of one vessel sitting still at one place and time.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedReport {
    pub vessel_id: VesselId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in knots.
    pub speed: f64,
    pub destination: String,
    pub navigational_status: NavigationalStatus,
}

impl CleanedReport {
    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

impl From<CleanedReport> for PositionReport {
    fn from(report: CleanedReport) -> Self {
        PositionReport {
            vessel_id: Some(report.vessel_id),
            timestamp: Some(report.timestamp),
            latitude: Some(report.latitude),
            longitude: Some(report.longitude),
            speed: Some(report.speed),
            destination: Some(report.destination).filter(|d| !d.is_empty()),
            navigational_status: Some(report.navigational_status.name().to_owned()),
        }
    }
}

impl Geo for CleanedReport {
    fn centroid(&self) -> Coord {
        self.coord()
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_point(self.coord())
    }
}

/// A cleaned report and the cluster it was assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub report: CleanedReport,
    pub cluster_id: ClusterId,
}

impl ClusterAssignment {
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE_CLUSTER_ID
    }
}
