//! Granular contact forces between finite-size spheres.
//!
//! A contact is described by four independent sub-models, each selected by a small
//! enum: the normal elastic law, normal damping, rolling resistance and conductive
//! heat exchange. Rolling resistance carries three components of history per
//! contact, stored in a [`ContactHistory`] keyed by the persistent tags of the two
//! spheres so that it survives neighbor-list rebuilds.

use super::contract::{ForceError, PairTerm, non_negative};
use super::history::{ContactHistory, ContactKey};
use super::tally::{ForceTally, TallyFlags};
use crate::core::models::atoms::AtomSet;
use crate::core::neighbor::ListingMode;
use crate::core::neighbor::cutoffs::CutoffTable;
use crate::core::neighbor::list::NeighborList;
use nalgebra::Vector3;
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{instrument, trace};

const EPSILON: f64 = 1e-10;

/// Elastic normal force. `damp` is the coefficient consumed by the damping model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case", deny_unknown_fields)]
pub enum NormalModel {
    /// `F = k * delta`
    Hooke { k: f64, damp: f64 },
    /// `F = k * a * delta` with contact radius `a = sqrt(delta * R_eff)`
    Hertz { k: f64, damp: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DampingModel {
    Velocity,
    MassVelocity,
    #[default]
    Viscoelastic,
    /// `damp` is read as a coefficient of restitution.
    Tsuji,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case", deny_unknown_fields)]
pub enum RollingModel {
    #[default]
    None,
    /// Spring-dashpot-slider resistance.
    Sds { k: f64, gamma: f64, mu: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case", deny_unknown_fields)]
pub enum HeatModel {
    #[default]
    None,
    Area { conductivity: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GranularModel {
    pub normal: NormalModel,
    #[serde(default)]
    pub damping: DampingModel,
    #[serde(default)]
    pub rolling: RollingModel,
    #[serde(default)]
    pub heat: HeatModel,
}

/// Per-atom sphere properties, indexed like the atom set (ghosts included).
#[derive(Debug, Clone, Default)]
pub struct SphereState {
    pub radius: Vec<f64>,
    pub mass: Vec<f64>,
    pub omega: Vec<Vector3<f64>>,
    pub temperature: Vec<f64>,
}

/// Forces, torques and heat flow from one granular evaluation.
#[derive(Debug, Clone)]
pub struct GranularOutput {
    pub tally: ForceTally,
    pub torques: Vec<Vector3<f64>>,
    pub heat_flow: Vec<f64>,
    pub contacts: usize,
}

/// Geometry and kinematics of one overlapping pair, seen from sphere `i`.
#[derive(Debug, Clone, Copy)]
struct Contact {
    nx: Vector3<f64>,
    r: f64,
    delta: f64,
    reff: f64,
    meff: f64,
    vnnr: f64,
    contact_radius: f64,
    relrot: Vector3<f64>,
}

impl GranularModel {
    pub fn validated(self) -> Result<Self, ForceError> {
        let (k, damp) = match self.normal {
            NormalModel::Hooke { k, damp } | NormalModel::Hertz { k, damp } => (k, damp),
        };
        non_negative("normal.k", k)?;
        non_negative("normal.damp", damp)?;
        if self.damping == DampingModel::Tsuji && damp > 1.0 {
            return Err(ForceError::InvalidCoefficient {
                name: "normal.damp",
                value: damp,
                reason: "Tsuji damping expects a restitution coefficient in [0, 1]",
            });
        }
        if let RollingModel::Sds { k, gamma, mu } = self.rolling {
            non_negative("rolling.k", k)?;
            non_negative("rolling.gamma", gamma)?;
            non_negative("rolling.mu", mu)?;
        }
        if let HeatModel::Area { conductivity } = self.heat {
            non_negative("heat.conductivity", conductivity)?;
        }
        Ok(self)
    }

    fn damp(&self) -> f64 {
        let damp = match self.normal {
            NormalModel::Hooke { damp, .. } | NormalModel::Hertz { damp, .. } => damp,
        };
        match self.damping {
            DampingModel::Tsuji => tsuji_coefficient(damp),
            _ => damp,
        }
    }

    fn normal_force(&self, c: &Contact) -> f64 {
        match self.normal {
            NormalModel::Hooke { k, .. } => k * c.delta,
            NormalModel::Hertz { k, .. } => k * c.contact_radius * c.delta,
        }
    }

    fn damping_force(&self, c: &Contact, fne: f64) -> f64 {
        let damp = self.damp();
        let prefactor = match self.damping {
            DampingModel::Velocity => damp,
            DampingModel::MassVelocity => damp * c.meff,
            DampingModel::Viscoelastic => damp * c.meff * c.contact_radius,
            DampingModel::Tsuji => {
                if c.delta > 0.0 {
                    damp * (c.meff * fne / c.delta).sqrt()
                } else {
                    0.0
                }
            }
        };
        -prefactor * c.vnnr
    }

    fn heat_flow(&self, c: &Contact, ti: f64, tj: f64) -> f64 {
        match self.heat {
            HeatModel::None => 0.0,
            HeatModel::Area { conductivity } => {
                let area = PI * c.contact_radius * c.contact_radius;
                conductivity * area * (tj - ti)
            }
        }
    }

    pub fn uses_history(&self) -> bool {
        matches!(self.rolling, RollingModel::Sds { .. })
    }
}

/// Tsuji damping prefactor as a polynomial in the restitution coefficient.
fn tsuji_coefficient(cor: f64) -> f64 {
    const C: [f64; 7] = [1.2728, -4.2783, 11.087, -22.348, 27.467, -18.022, 4.8218];
    C.iter().rev().fold(0.0, |acc, c| acc * cor + c)
}

/// Spring-dashpot-slider rolling resistance; updates `hist` in place and returns
/// the rolling force.
fn rolling_sds(
    (k, gamma, mu): (f64, f64, f64),
    fncrit: f64,
    nx: &Vector3<f64>,
    vrl: &Vector3<f64>,
    dt: f64,
    hist: &mut [f64; 3],
) -> Vector3<f64> {
    let frcrit = mu * fncrit;
    let mut h = Vector3::from(*hist);

    // keep the stored displacement in the current tangential plane
    let rolldotn = h.dot(nx);
    if rolldotn.abs() * k > EPSILON * frcrit {
        let rollmag = h.norm();
        h -= nx * rolldotn;
        let prjmag = h.norm();
        let scale = if prjmag > 0.0 { rollmag / prjmag } else { 0.0 };
        h *= scale;
    }
    h += vrl * dt;

    let mut fr = -k * h - gamma * vrl;
    let magfr = fr.norm();
    if magfr > frcrit {
        if h.norm() != 0.0 {
            if k > 0.0 {
                h = -(frcrit / (k * magfr)) * fr - (gamma / k) * vrl;
            }
            fr *= frcrit / magfr;
        } else {
            fr = Vector3::zeros();
        }
    }

    *hist = [h.x, h.y, h.z];
    fr
}

/// A granular pair style bound to its per-contact rolling history.
#[derive(Debug, Clone)]
pub struct GranularPair {
    model: GranularModel,
    history: ContactHistory<3>,
}

impl GranularPair {
    pub fn new(model: GranularModel) -> Result<Self, ForceError> {
        Ok(Self {
            model: model.validated()?,
            history: ContactHistory::new(),
        })
    }

    pub fn with_history(mut self, history: ContactHistory<3>) -> Self {
        self.history = history;
        self
    }

    pub fn model(&self) -> &GranularModel {
        &self.model
    }

    pub fn history(&self) -> &ContactHistory<3> {
        &self.history
    }

    /// Neighbor cutoffs that cover any contact between spheres up to `max_radius`.
    pub fn cutoffs(ntypes: usize, max_radius: f64) -> CutoffTable {
        CutoffTable::uniform(ntypes, 2.0 * max_radius)
    }

    /// Evaluates every overlapping pair of a half Newton-on list.
    ///
    /// Each contact is evaluated from the perspective of the sphere with the smaller
    /// tag, so its rolling history has one orientation no matter which atom owns
    /// the list entry after a rebuild. Contacts absent from this evaluation lose
    /// their history.
    #[instrument(skip_all, name = "granular_forces")]
    pub fn compute(
        &mut self,
        list: &NeighborList,
        atoms: &AtomSet,
        spheres: &SphereState,
        dt: f64,
        flags: TallyFlags,
    ) -> Result<GranularOutput, ForceError> {
        if list.mode() != ListingMode::HalfNewtonOn {
            return Err(ForceError::UnsupportedListing {
                potential: "granular".to_string(),
                mode: list.mode(),
            });
        }
        let n = atoms.len();
        for (name, found) in [
            ("radius", spheres.radius.len()),
            ("mass", spheres.mass.len()),
            ("omega", spheres.omega.len()),
            ("temperature", spheres.temperature.len()),
        ] {
            if found != n {
                return Err(ForceError::ArrayLength {
                    name,
                    expected: n,
                    found,
                });
            }
        }

        let positions = atoms.positions();
        let velocities = atoms.velocities();
        let mut output = GranularOutput {
            tally: ForceTally::new(n, TallyFlags { energy: false, ..flags }),
            torques: vec![Vector3::zeros(); n],
            heat_flow: vec![0.0; n],
            contacts: 0,
        };

        self.history.begin_step();
        for (i, neighbors) in list.iter() {
            for &j in neighbors {
                let (a, b) = if atoms.tag(i) <= atoms.tag(j) { (i, j) } else { (j, i) };
                let del = positions[a] - positions[b];
                let rsq = del.norm_squared();
                let radsum = spheres.radius[a] + spheres.radius[b];
                if rsq >= radsum * radsum {
                    continue;
                }
                let r = rsq.sqrt();
                if r == 0.0 {
                    continue;
                }
                let reff = spheres.radius[a] * spheres.radius[b] / radsum;
                let delta = radsum - r;
                let nx = del / r;
                let vr = velocities[a] - velocities[b];
                let (ma, mb) = (spheres.mass[a], spheres.mass[b]);
                let contact = Contact {
                    nx,
                    r,
                    delta,
                    reff,
                    meff: ma * mb / (ma + mb),
                    vnnr: vr.dot(&nx),
                    contact_radius: (delta * reff).sqrt(),
                    relrot: spheres.omega[a] - spheres.omega[b],
                };

                let fne = self.model.normal_force(&contact);
                let fntot = fne + self.model.damping_force(&contact, fne);
                output.tally.apply_pair(
                    a,
                    b,
                    atoms.nlocal(),
                    ListingMode::HalfNewtonOn,
                    &del,
                    PairTerm {
                        fpair: fntot / contact.r,
                        energy: 0.0,
                    },
                );

                if let RollingModel::Sds { k, gamma, mu } = self.model.rolling {
                    let vrl = contact.reff * contact.relrot.cross(&contact.nx);
                    let key = ContactKey::new(atoms.tag(a), atoms.tag(b));
                    let hist = self.history.entry(key);
                    let fr = rolling_sds((k, gamma, mu), fntot.abs(), &nx, &vrl, dt, hist);
                    let torroll = contact.reff * nx.cross(&fr);
                    output.torques[a] += torroll;
                    output.torques[b] -= torroll;
                }

                let dq = self.model.heat_flow(
                    &contact,
                    spheres.temperature[a],
                    spheres.temperature[b],
                );
                output.heat_flow[a] += dq;
                output.heat_flow[b] -= dq;
                output.contacts += 1;
            }
        }
        let ended = self.history.end_step();
        trace!(contacts = output.contacts, ended, "Granular contacts evaluated.");

        Ok(output)
    }
}
