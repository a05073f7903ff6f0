//! Run configuration: parsing, validation, and model resolution.
//!
//! Configurations are plain-text `key = value` files with `#` comments
//! and case-insensitive keys. Statistic selections are brace lists whose
//! items may carry an `(attribute)` qualifier and, for simulation runs,
//! a `= value` parameter value:
//!
//! ```text
//! arclistFile   = observed.net
//! useTNTsampler = True
//! structParams  = {Arc, Reciprocity, AltKTrianglesT}
//! attrParams    = {Sender(gender), Diff(age)}
//! ```
//!
//! Everything is checked before sampling starts: unknown keys, duplicate
//! keys, contradictory sampler flags, and unknown statistic or attribute
//! names all fail with the offending line.

use std::path::{Path, PathBuf};

use pest::Parser;
use pest_derive::Parser;
use smallvec::SmallVec;

use ergonet_core::engine::estimator::EstimateSettings;
use ergonet_core::engine::graph::AttributeSet;
use ergonet_core::engine::sampler::{SamplerKind, SamplerOptions};
use ergonet_core::engine::simulate::SimulationSettings;
use ergonet_core::engine::stats::{Model, StatisticKind, Term, DEFAULT_LAMBDA};
use ergonet_core::engine::twopath::TwoPathBackend;

use crate::errors::FrontendError;

#[derive(Parser)]
#[grammar = "../grammar.pest"]
struct ConfigParser;

/// What a configuration is being used for; some checks differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Estimation,
    Simulation,
}

/// One statistic selection from a parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub args: Vec<String>,
    /// Parameter value, only meaningful for simulation runs.
    pub value: Option<f64>,
    pub line: usize,
}

/// A fully parsed configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    // sampler selection
    pub use_ifd_sampler: bool,
    pub use_tnt_sampler: bool,
    pub ifd_k: f64,
    pub tnt_hastings: bool,

    // estimation hyperparameters
    pub aca_s: f64,
    pub aca_ee: f64,
    pub comp_c: f64,
    pub sampler_steps: u64,
    pub s_steps: u32,
    pub ee_steps: u32,
    pub ee_inner_steps: u32,

    // inputs
    pub arclist_file: Option<PathBuf>,
    pub binattr_file: Option<PathBuf>,
    pub catattr_file: Option<PathBuf>,
    pub contattr_file: Option<PathBuf>,
    pub setattr_file: Option<PathBuf>,
    pub zone_file: Option<PathBuf>,

    // flags
    pub use_conditional_estimation: bool,
    pub forbid_reciprocity: bool,
    pub allow_loops: bool,

    // model
    pub lambda: f64,
    pub two_path_index: TwoPathBackend,
    pub seed: Option<u64>,
    pub struct_params: Vec<ParamSpec>,
    pub attr_params: Vec<ParamSpec>,
    pub dyadic_params: Vec<ParamSpec>,
    pub attr_interaction_params: Vec<ParamSpec>,

    // outputs
    pub theta_file_prefix: Option<String>,
    pub dz_a_file_prefix: Option<String>,
    pub stats_file: Option<PathBuf>,
    pub sim_net_file_prefix: Option<String>,

    // simulation
    pub num_nodes: Option<u32>,
    pub sample_size: u32,
    pub interval: u64,
    pub burnin: u64,
    pub output_simulated_networks: bool,
}

impl Default for Config {
    fn default() -> Self {
        let est = EstimateSettings::default();
        let sim = SimulationSettings::default();
        Self {
            use_ifd_sampler: false,
            use_tnt_sampler: false,
            ifd_k: 0.1,
            tnt_hastings: false,
            aca_s: est.aca_s,
            aca_ee: est.aca_ee,
            comp_c: est.comp_c,
            sampler_steps: est.sampler_steps,
            s_steps: est.s_steps,
            ee_steps: est.ee_steps,
            ee_inner_steps: est.ee_inner_steps,
            arclist_file: None,
            binattr_file: None,
            catattr_file: None,
            contattr_file: None,
            setattr_file: None,
            zone_file: None,
            use_conditional_estimation: false,
            forbid_reciprocity: false,
            allow_loops: false,
            lambda: DEFAULT_LAMBDA,
            two_path_index: TwoPathBackend::Sparse,
            seed: None,
            struct_params: Vec::new(),
            attr_params: Vec::new(),
            dyadic_params: Vec::new(),
            attr_interaction_params: Vec::new(),
            theta_file_prefix: None,
            dz_a_file_prefix: None,
            stats_file: None,
            sim_net_file_prefix: None,
            num_nodes: None,
            sample_size: sim.sample_size,
            interval: sim.interval,
            burnin: sim.burnin,
            output_simulated_networks: false,
        }
    }
}

enum RawValue {
    Scalar(String),
    List(Vec<ParamSpec>),
}

struct RawEntry {
    key: String,
    line: usize,
    value: RawValue,
}

fn parse_entries(source: &str) -> Result<Vec<RawEntry>, FrontendError> {
    let mut pairs = ConfigParser::parse(Rule::file, source)
        .map_err(|e| FrontendError::Config(e.to_string()))?;
    let file = pairs.next().expect("grammar yields one file node");

    let mut entries = Vec::new();
    for entry in file.into_inner() {
        if entry.as_rule() != Rule::entry {
            continue;
        }
        let line = entry.as_span().start_pos().line_col().0;
        let mut inner = entry.into_inner();
        let key = inner.next().expect("entry has a key").as_str().to_string();
        let value_node = inner
            .next()
            .expect("entry has a value")
            .into_inner()
            .next()
            .expect("value wraps list or scalar");
        let value = match value_node.as_rule() {
            Rule::scalar => RawValue::Scalar(value_node.as_str().trim().to_string()),
            Rule::list => {
                let mut items = Vec::new();
                for item in value_node.into_inner() {
                    debug_assert_eq!(item.as_rule(), Rule::item);
                    let item_line = item.as_span().start_pos().line_col().0;
                    let mut name = String::new();
                    let mut args = Vec::new();
                    let mut value = None;
                    for part in item.into_inner() {
                        match part.as_rule() {
                            Rule::name => name = part.as_str().to_string(),
                            Rule::qualifier => {
                                args = part
                                    .into_inner()
                                    .map(|a| a.as_str().to_string())
                                    .collect();
                            }
                            Rule::number => {
                                value = Some(part.as_str().parse::<f64>().map_err(|e| {
                                    FrontendError::Config(format!(
                                        "line {}: bad parameter value: {}",
                                        item_line, e
                                    ))
                                })?);
                            }
                            _ => {}
                        }
                    }
                    items.push(ParamSpec {
                        name,
                        args,
                        value,
                        line: item_line,
                    });
                }
                RawValue::List(items)
            }
            other => {
                return Err(FrontendError::Config(format!(
                    "line {}: unexpected value form {:?}",
                    line, other
                )))
            }
        };
        entries.push(RawEntry { key, line, value });
    }
    Ok(entries)
}

fn parse_bool(key: &str, line: usize, raw: &str) -> Result<bool, FrontendError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FrontendError::Config(format!(
            "line {}: {} expects True or False, got '{}'",
            line, key, raw
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, line: usize, raw: &str) -> Result<T, FrontendError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        FrontendError::Config(format!("line {}: bad value for {}: {}", line, key, e))
    })
}

fn expect_scalar<'v>(
    key: &str,
    line: usize,
    value: &'v RawValue,
) -> Result<&'v str, FrontendError> {
    match value {
        RawValue::Scalar(s) => Ok(s.as_str()),
        RawValue::List(_) => Err(FrontendError::Config(format!(
            "line {}: {} expects a plain value, not a list",
            line, key
        ))),
    }
}

fn expect_list(key: &str, line: usize, value: &RawValue) -> Result<Vec<ParamSpec>, FrontendError> {
    match value {
        RawValue::List(items) => Ok(items.clone()),
        RawValue::Scalar(_) => Err(FrontendError::Config(format!(
            "line {}: {} expects a {{...}} list",
            line, key
        ))),
    }
}

impl Config {
    /// Reads and parses a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, FrontendError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| FrontendError::io(path.display().to_string(), e))?;
        Self::parse(&source)
    }

    /// Parses configuration text. Unknown and duplicate keys are errors.
    pub fn parse(source: &str) -> Result<Self, FrontendError> {
        let mut config = Config::default();
        let mut seen: Vec<String> = Vec::new();

        for entry in parse_entries(source)? {
            let lower = entry.key.to_ascii_lowercase();
            if seen.contains(&lower) {
                return Err(FrontendError::Config(format!(
                    "line {}: duplicate key {}",
                    entry.line, entry.key
                )));
            }
            seen.push(lower.clone());
            config.apply(&lower, &entry)?;
        }
        Ok(config)
    }

    fn apply(&mut self, lower_key: &str, entry: &RawEntry) -> Result<(), FrontendError> {
        let line = entry.line;
        let key = &entry.key;

        match lower_key {
            "useifdsampler" => self.use_ifd_sampler = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?,
            "usetntsampler" => self.use_tnt_sampler = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?,
            "ifd_k" => self.ifd_k = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "tnthastings" => self.tnt_hastings = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?,
            "aca_s" => self.aca_s = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "aca_ee" => self.aca_ee = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "compc" => self.comp_c = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "samplersteps" => self.sampler_steps = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "ssteps" => self.s_steps = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "eesteps" => self.ee_steps = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "eeinnersteps" => self.ee_inner_steps = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "arclistfile" => self.arclist_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "binattrfile" => self.binattr_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "catattrfile" => self.catattr_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "contattrfile" => self.contattr_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "setattrfile" => self.setattr_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "zonefile" => self.zone_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "useconditionalestimation" => {
                self.use_conditional_estimation = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?
            }
            "forbidreciprocity" => {
                self.forbid_reciprocity = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?
            }
            "allowloops" => self.allow_loops = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?,
            "lambda" => self.lambda = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "twopathindex" => {
                self.two_path_index = match expect_scalar(key, line, &entry.value)?.to_ascii_lowercase().as_str() {
                    "none" => TwoPathBackend::Disabled,
                    "dense" => TwoPathBackend::Dense,
                    "sparse" => TwoPathBackend::Sparse,
                    other => {
                        return Err(FrontendError::Config(format!(
                            "line {}: twoPathIndex must be none, dense, or sparse, got '{}'",
                            line, other
                        )))
                    }
                }
            }
            "seed" => self.seed = Some(parse_num(key, line, expect_scalar(key, line, &entry.value)?)?),
            "structparams" => self.struct_params = expect_list(key, line, &entry.value)?,
            "attrparams" => self.attr_params = expect_list(key, line, &entry.value)?,
            "dyadicparams" => self.dyadic_params = expect_list(key, line, &entry.value)?,
            "attrinteractionparams" => self.attr_interaction_params = expect_list(key, line, &entry.value)?,
            "thetafileprefix" => {
                self.theta_file_prefix = Some(expect_scalar(key, line, &entry.value)?.to_string())
            }
            "dzafileprefix" => self.dz_a_file_prefix = Some(expect_scalar(key, line, &entry.value)?.to_string()),
            "statsfile" => self.stats_file = Some(PathBuf::from(expect_scalar(key, line, &entry.value)?)),
            "simnetfileprefix" => {
                self.sim_net_file_prefix = Some(expect_scalar(key, line, &entry.value)?.to_string())
            }
            "numnodes" => self.num_nodes = Some(parse_num(key, line, expect_scalar(key, line, &entry.value)?)?),
            "samplesize" => self.sample_size = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "interval" => self.interval = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "burnin" => self.burnin = parse_num(key, line, expect_scalar(key, line, &entry.value)?)?,
            "outputsimulatednetworks" => {
                self.output_simulated_networks = parse_bool(key, line, expect_scalar(key, line, &entry.value)?)?
            }
            _ => {
                return Err(FrontendError::Config(format!(
                    "line {}: unknown key {}",
                    line, key
                )))
            }
        }
        Ok(())
    }

    /// Consistency checks that need no input files.
    pub fn validate(&self, mode: RunMode) -> Result<(), FrontendError> {
        if self.use_ifd_sampler && self.use_tnt_sampler {
            return Err(FrontendError::Config(
                "useIFDsampler and useTNTsampler are mutually exclusive".into(),
            ));
        }
        if self.allow_loops {
            return Err(FrontendError::Config(
                "allowLoops is recognized but self loops are not supported".into(),
            ));
        }
        if self.use_conditional_estimation {
            if self.zone_file.is_none() {
                return Err(FrontendError::Config(
                    "useConditionalEstimation requires a zoneFile".into(),
                ));
            }
            if self.forbid_reciprocity {
                return Err(FrontendError::Config(
                    "conditional estimation with forbidReciprocity is not implemented".into(),
                ));
            }
        }
        if self.tnt_hastings {
            if !self.use_tnt_sampler {
                return Err(FrontendError::Config(
                    "tntHastings requires useTNTsampler".into(),
                ));
            }
            if self.use_conditional_estimation {
                return Err(FrontendError::Config(
                    "tntHastings is only available without conditional estimation".into(),
                ));
            }
        }
        if self.num_statistics() == 0 {
            return Err(FrontendError::Config(
                "no statistics selected; set structParams, attrParams, dyadicParams, or \
                 attrInteractionParams"
                    .into(),
            ));
        }

        match mode {
            RunMode::Estimation => {
                if self.arclist_file.is_none() {
                    return Err(FrontendError::Config(
                        "estimation requires an arclistFile".into(),
                    ));
                }
                if self.theta_file_prefix.is_some() != self.dz_a_file_prefix.is_some() {
                    return Err(FrontendError::Config(
                        "thetaFilePrefix and dzAFilePrefix must be set together".into(),
                    ));
                }
            }
            RunMode::Simulation => {
                if self.arclist_file.is_none() && self.num_nodes.is_none() {
                    return Err(FrontendError::Config(
                        "simulation requires numNodes or an arclistFile".into(),
                    ));
                }
                if self.output_simulated_networks && self.sim_net_file_prefix.is_none() {
                    return Err(FrontendError::Config(
                        "outputSimulatedNetworks requires a simNetFilePrefix".into(),
                    ));
                }
                if self.use_conditional_estimation {
                    return Err(FrontendError::Config(
                        "conditional estimation does not apply to simulation".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn num_statistics(&self) -> usize {
        self.struct_params.len()
            + self.attr_params.len()
            + self.dyadic_params.len()
            + self.attr_interaction_params.len()
    }

    pub fn sampler_kind(&self) -> SamplerKind {
        if self.use_ifd_sampler {
            SamplerKind::Ifd
        } else if self.use_tnt_sampler {
            SamplerKind::TieNoTie
        } else {
            SamplerKind::Basic
        }
    }

    pub fn sampler_options(&self) -> SamplerOptions {
        SamplerOptions {
            perform_move: true,
            conditional: self.use_conditional_estimation,
            forbid_reciprocity: self.forbid_reciprocity,
            hastings_correction: self.tnt_hastings,
            ifd_step: self.ifd_k,
        }
    }

    pub fn estimate_settings(&self) -> EstimateSettings {
        EstimateSettings {
            aca_s: self.aca_s,
            aca_ee: self.aca_ee,
            comp_c: self.comp_c,
            sampler_steps: self.sampler_steps,
            s_steps: self.s_steps,
            ee_steps: self.ee_steps,
            ee_inner_steps: self.ee_inner_steps,
        }
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            burnin: self.burnin,
            sample_size: self.sample_size,
            interval: self.interval,
        }
    }
}

/// A resolved model together with the per-term parameter values found in
/// the configuration (simulation configs carry them, estimation configs
/// must not).
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model: Model,
    values: Vec<Option<f64>>,
}

impl ResolvedModel {
    /// Theta for a simulation run; every term must carry a value.
    pub fn theta(&self) -> Result<Vec<f64>, FrontendError> {
        self.values
            .iter()
            .zip(self.model.terms())
            .map(|(v, term)| {
                v.ok_or_else(|| {
                    FrontendError::Config(format!(
                        "simulation needs a parameter value for {} (write {} = <value>)",
                        term.label, term.label
                    ))
                })
            })
            .collect()
    }

    fn ensure_no_values(&self) -> Result<(), FrontendError> {
        if let Some(term) = self
            .values
            .iter()
            .zip(self.model.terms())
            .find_map(|(v, t)| v.map(|_| t))
        {
            return Err(FrontendError::Config(format!(
                "parameter value given for {}; values are only meaningful for simulation",
                term.label
            )));
        }
        Ok(())
    }
}

struct KindSpec {
    name: &'static str,
    build: fn(&ParamSpec, &AttributeSet) -> Result<StatisticKind, String>,
}

fn no_args(spec: &ParamSpec, kind: StatisticKind) -> Result<StatisticKind, String> {
    if spec.args.is_empty() {
        Ok(kind)
    } else {
        Err(format!("{} takes no attribute qualifier", spec.name))
    }
}

fn one_attr<'a>(spec: &'a ParamSpec) -> Result<&'a str, String> {
    match spec.args.as_slice() {
        [a] => Ok(a.as_str()),
        _ => Err(format!(
            "{} needs exactly one attribute qualifier, e.g. {}(age)",
            spec.name, spec.name
        )),
    }
}

fn binary_attr(spec: &ParamSpec, attrs: &AttributeSet) -> Result<usize, String> {
    let name = one_attr(spec)?;
    attrs
        .binary_index(name)
        .ok_or_else(|| format!("unknown binary attribute '{}'", name))
}

fn categorical_attr(spec: &ParamSpec, attrs: &AttributeSet) -> Result<usize, String> {
    let name = one_attr(spec)?;
    attrs
        .categorical_index(name)
        .ok_or_else(|| format!("unknown categorical attribute '{}'", name))
}

fn continuous_attr(spec: &ParamSpec, attrs: &AttributeSet) -> Result<usize, String> {
    let name = one_attr(spec)?;
    attrs
        .continuous_index(name)
        .ok_or_else(|| format!("unknown continuous attribute '{}'", name))
}

const STRUCT_KINDS: &[KindSpec] = &[
    KindSpec { name: "Arc", build: |s, _| no_args(s, StatisticKind::Arc) },
    KindSpec { name: "Reciprocity", build: |s, _| no_args(s, StatisticKind::Reciprocity) },
    KindSpec { name: "AltInStars", build: |s, _| no_args(s, StatisticKind::AltInStars) },
    KindSpec { name: "AltOutStars", build: |s, _| no_args(s, StatisticKind::AltOutStars) },
    KindSpec { name: "In2Stars", build: |s, _| no_args(s, StatisticKind::In2Stars) },
    KindSpec { name: "Out2Stars", build: |s, _| no_args(s, StatisticKind::Out2Stars) },
    KindSpec { name: "Isolates", build: |s, _| no_args(s, StatisticKind::Isolates) },
    KindSpec { name: "Sink", build: |s, _| no_args(s, StatisticKind::Sink) },
    KindSpec { name: "Source", build: |s, _| no_args(s, StatisticKind::Source) },
    KindSpec { name: "AltKTrianglesT", build: |s, _| no_args(s, StatisticKind::AltKTrianglesT) },
    KindSpec { name: "AltKTrianglesC", build: |s, _| no_args(s, StatisticKind::AltKTrianglesC) },
    KindSpec { name: "AltKTrianglesD", build: |s, _| no_args(s, StatisticKind::AltKTrianglesD) },
    KindSpec { name: "AltKTrianglesU", build: |s, _| no_args(s, StatisticKind::AltKTrianglesU) },
    KindSpec { name: "AltTwoPathsT", build: |s, _| no_args(s, StatisticKind::AltTwoPathsT) },
    KindSpec { name: "AltTwoPathsD", build: |s, _| no_args(s, StatisticKind::AltTwoPathsD) },
    KindSpec { name: "AltTwoPathsU", build: |s, _| no_args(s, StatisticKind::AltTwoPathsU) },
];

const ATTR_KINDS: &[KindSpec] = &[
    KindSpec {
        name: "Sender",
        build: |s, a| Ok(StatisticKind::Sender { attr: binary_attr(s, a)? }),
    },
    KindSpec {
        name: "Receiver",
        build: |s, a| Ok(StatisticKind::Receiver { attr: binary_attr(s, a)? }),
    },
    KindSpec {
        name: "Interaction",
        build: |s, a| Ok(StatisticKind::Interaction { attr: binary_attr(s, a)? }),
    },
    KindSpec {
        name: "Matching",
        build: |s, a| Ok(StatisticKind::Matching { attr: categorical_attr(s, a)? }),
    },
    KindSpec {
        name: "MatchingReciprocity",
        build: |s, a| Ok(StatisticKind::MatchingReciprocity { attr: categorical_attr(s, a)? }),
    },
    KindSpec {
        name: "Mismatching",
        build: |s, a| Ok(StatisticKind::Mismatching { attr: categorical_attr(s, a)? }),
    },
    KindSpec {
        name: "Diff",
        build: |s, a| Ok(StatisticKind::Diff { attr: continuous_attr(s, a)? }),
    },
    KindSpec {
        name: "DiffReciprocity",
        build: |s, a| Ok(StatisticKind::DiffReciprocity { attr: continuous_attr(s, a)? }),
    },
    KindSpec {
        name: "JaccardSimilarity",
        build: |s, a| {
            let name = one_attr(s)?;
            let attr = a
                .set_index(name)
                .ok_or_else(|| format!("unknown set attribute '{}'", name))?;
            Ok(StatisticKind::JaccardSimilarity { attr })
        },
    },
];

const DYADIC_KINDS: &[KindSpec] = &[KindSpec {
    name: "EuclideanDistance",
    build: |s, a| {
        if s.args.len() < 2 || s.args.len() > 3 {
            return Err(
                "EuclideanDistance needs two or three continuous coordinate attributes".into(),
            );
        }
        let mut coords = SmallVec::new();
        for name in &s.args {
            let col = a
                .continuous_index(name)
                .ok_or_else(|| format!("unknown continuous attribute '{}'", name))?;
            coords.push(col);
        }
        Ok(StatisticKind::EuclideanDistance { coords })
    },
}];

const INTERACTION_KINDS: &[KindSpec] = &[KindSpec {
    name: "MatchingInteraction",
    build: |s, a| match s.args.as_slice() {
        [first, second] => {
            let first = a
                .categorical_index(first)
                .ok_or_else(|| format!("unknown categorical attribute '{}'", first))?;
            let second = a
                .categorical_index(second)
                .ok_or_else(|| format!("unknown categorical attribute '{}'", second))?;
            Ok(StatisticKind::MatchingInteraction { first, second })
        }
        _ => Err("MatchingInteraction needs exactly two categorical attributes".into()),
    },
}];

fn resolve_group(
    group: &str,
    specs: &[ParamSpec],
    kinds: &[KindSpec],
    attrs: &AttributeSet,
    terms: &mut Vec<Term>,
    values: &mut Vec<Option<f64>>,
) -> Result<(), FrontendError> {
    for spec in specs {
        let kind_spec = kinds
            .iter()
            .find(|k| k.name.eq_ignore_ascii_case(&spec.name))
            .ok_or_else(|| {
                FrontendError::Config(format!(
                    "line {}: unknown {} statistic '{}'",
                    spec.line, group, spec.name
                ))
            })?;
        let kind = (kind_spec.build)(spec, attrs).map_err(|msg| {
            FrontendError::Config(format!("line {}: {}", spec.line, msg))
        })?;
        let label = if spec.args.is_empty() {
            kind_spec.name.to_string()
        } else {
            format!("{}_{}", kind_spec.name, spec.args.join("_"))
        };
        terms.push(Term { kind, label });
        values.push(spec.value);
    }
    Ok(())
}

/// Resolves the configured statistic lists against the loaded attribute
/// columns, in the documented theta order: structural, attribute,
/// dyadic, attribute interaction.
pub fn resolve_model(
    config: &Config,
    attrs: &AttributeSet,
    mode: RunMode,
) -> Result<ResolvedModel, FrontendError> {
    let mut terms = Vec::new();
    let mut values = Vec::new();
    resolve_group("structural", &config.struct_params, STRUCT_KINDS, attrs, &mut terms, &mut values)?;
    resolve_group("attribute", &config.attr_params, ATTR_KINDS, attrs, &mut terms, &mut values)?;
    resolve_group("dyadic", &config.dyadic_params, DYADIC_KINDS, attrs, &mut terms, &mut values)?;
    resolve_group(
        "attribute interaction",
        &config.attr_interaction_params,
        INTERACTION_KINDS,
        attrs,
        &mut terms,
        &mut values,
    )?;

    let model = Model::new(terms, config.lambda)?;
    if config.use_ifd_sampler && model.has_arc_term() {
        return Err(FrontendError::Config(
            "the Arc statistic is replaced by the auxiliary density parameter under \
             useIFDsampler; remove it from structParams"
                .into(),
        ));
    }

    let resolved = ResolvedModel { model, values };
    if mode == RunMode::Estimation {
        resolved.ensure_no_values()?;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "\
# estimation run
arclistFile = net.txt
useTNTsampler = True
structParams = {Arc, Reciprocity, AltKTrianglesT}
";

    #[test]
    fn parses_keys_case_insensitively_with_comments() {
        let config = Config::parse(
            "# header comment\n\
             ARCLISTFILE = some/net.txt   # trailing comment\n\
             usetntsampler = TRUE\n\
             Ssteps = 42\n\
             structParams = {Arc}\n",
        )
        .unwrap();
        assert_eq!(config.arclist_file.as_deref(), Some(Path::new("some/net.txt")));
        assert!(config.use_tnt_sampler);
        assert_eq!(config.s_steps, 42);
    }

    #[test]
    fn rejects_unknown_and_duplicate_keys() {
        let err = Config::parse("bogusKey = 1\n").unwrap_err();
        assert!(err.to_string().contains("unknown key"));

        let err = Config::parse("Ssteps = 1\nssteps = 2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn parses_multiline_lists_with_qualifiers_and_values() {
        let config = Config::parse(
            "numNodes = 50\n\
             structParams = {Arc = -2.0,\n    Reciprocity = 1.5}\n\
             attrParams = {Sender(gender), Diff(age) = 0.1}\n",
        )
        .unwrap();
        assert_eq!(config.struct_params.len(), 2);
        assert_eq!(config.struct_params[0].value, Some(-2.0));
        assert_eq!(config.attr_params[1].args, vec!["age".to_string()]);
        assert_eq!(config.attr_params[1].value, Some(0.1));
        assert_eq!(config.attr_params[0].value, None);
    }

    #[test]
    fn contradictory_samplers_are_rejected() {
        let source = format!("{}useIFDsampler = True\n", BASE);
        let config = Config::parse(&source).unwrap();
        let err = config.validate(RunMode::Estimation).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn allow_loops_is_recognized_but_rejected() {
        let source = format!("{}allowLoops = True\n", BASE);
        let config = Config::parse(&source).unwrap();
        assert!(config.validate(RunMode::Estimation).is_err());
    }

    #[test]
    fn conditional_needs_zone_file_and_no_forbid_reciprocity() {
        let source = format!("{}useConditionalEstimation = True\n", BASE);
        let config = Config::parse(&source).unwrap();
        assert!(config.validate(RunMode::Estimation).is_err());

        let source = format!(
            "{}useConditionalEstimation = True\nzoneFile = zones.txt\nforbidReciprocity = True\n",
            BASE
        );
        let config = Config::parse(&source).unwrap();
        assert!(config.validate(RunMode::Estimation).is_err());

        let source = format!(
            "{}useConditionalEstimation = True\nzoneFile = zones.txt\n",
            BASE
        );
        let config = Config::parse(&source).unwrap();
        config.validate(RunMode::Estimation).unwrap();
    }

    #[test]
    fn resolves_statistics_in_documented_order() {
        let mut attrs = AttributeSet::new(3);
        attrs.add_binary("treated", vec![Some(1), Some(0), None]).unwrap();
        attrs
            .add_categorical("class", vec![Some(0), Some(1), Some(1)])
            .unwrap();
        attrs
            .add_continuous("x", vec![Some(0.0), Some(1.0), Some(2.0)])
            .unwrap();
        attrs
            .add_continuous("y", vec![Some(0.0), Some(0.5), Some(1.0)])
            .unwrap();

        let config = Config::parse(
            "arclistFile = net.txt\n\
             structParams = {Arc, Reciprocity}\n\
             attrParams = {Sender(treated), Matching(class)}\n\
             dyadicParams = {EuclideanDistance(x, y)}\n\
             attrInteractionParams = {MatchingInteraction(class, class)}\n",
        )
        .unwrap();
        let resolved = resolve_model(&config, &attrs, RunMode::Estimation).unwrap();
        let labels: Vec<&str> = resolved.model.labels().collect();
        assert_eq!(
            labels,
            vec![
                "Arc",
                "Reciprocity",
                "Sender_treated",
                "Matching_class",
                "EuclideanDistance_x_y",
                "MatchingInteraction_class_class",
            ]
        );
    }

    #[test]
    fn unknown_statistic_and_attribute_names_are_reported() {
        let attrs = AttributeSet::new(2);
        let config = Config::parse("arclistFile = n\nstructParams = {Wedges}\n").unwrap();
        let err = resolve_model(&config, &attrs, RunMode::Estimation).unwrap_err();
        assert!(err.to_string().contains("Wedges"));

        let config = Config::parse("arclistFile = n\nattrParams = {Sender(ghost)}\n").unwrap();
        let err = resolve_model(&config, &attrs, RunMode::Estimation).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn simulation_theta_requires_values_estimation_forbids_them() {
        let attrs = AttributeSet::new(2);
        let config =
            Config::parse("numNodes = 10\nstructParams = {Arc = -1.0, Reciprocity}\n").unwrap();
        let resolved = resolve_model(&config, &attrs, RunMode::Simulation).unwrap();
        assert!(resolved.theta().is_err());

        let config =
            Config::parse("numNodes = 10\nstructParams = {Arc = -1.0, Reciprocity = 0.5}\n")
                .unwrap();
        let resolved = resolve_model(&config, &attrs, RunMode::Simulation).unwrap();
        assert_eq!(resolved.theta().unwrap(), vec![-1.0, 0.5]);

        let err = resolve_model(&config, &attrs, RunMode::Estimation).unwrap_err();
        assert!(err.to_string().contains("only meaningful for simulation"));
    }

    #[test]
    fn ifd_excludes_the_arc_statistic() {
        let attrs = AttributeSet::new(2);
        let config = Config::parse(
            "arclistFile = n\nuseIFDsampler = True\nstructParams = {Arc, Reciprocity}\n",
        )
        .unwrap();
        assert!(resolve_model(&config, &attrs, RunMode::Estimation).is_err());
    }
}
