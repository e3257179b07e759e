//! Ownership of problems and surveys, and the one-to-one relation between them.
//!
//! Problems and surveys never point at each other. The registry stores both
//! and keeps the relation in two maps that are always updated together, so a
//! problem has at most one survey and a survey belongs to at most one problem.
//!
//! ```text
//!            pair (kind check, exclusivity check)
//! Unpaired ────────────────────────────────────────► Paired
//!    ▲                                                  │
//!    └────────────────────── unpair ────────────────────┘
//! ```
//!
//! Every forward and sensitivity call made through the registry is timed and
//! reported to its [`MetricsSink`].

use crate::numerics::timing::{Counter, MetricsSink, TimerGuard};
use crate::problem::{Fields, Problem, ProblemError};
use crate::survey::{Survey, SurveyGeometry};
use log::{debug, info};
use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProblemId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurveyId(usize);

pub struct PairingRegistry {
    // removed entries leave `None` so ids are never reused
    problems: Vec<Option<Box<dyn Problem>>>,
    surveys: Vec<Option<Survey>>,
    survey_of: HashMap<ProblemId, SurveyId>,
    problem_of: HashMap<SurveyId, ProblemId>,
    metrics: Rc<dyn MetricsSink>,
}

impl Default for PairingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingRegistry {
    /// A registry that records timings into a private [`Counter`].
    pub fn new() -> Self {
        Self::with_metrics(Rc::new(Counter::new()))
    }

    pub fn with_metrics(metrics: Rc<dyn MetricsSink>) -> Self {
        Self {
            problems: Vec::new(),
            surveys: Vec::new(),
            survey_of: HashMap::new(),
            problem_of: HashMap::new(),
            metrics,
        }
    }

    pub fn add_problem<P: Problem + 'static>(&mut self, problem: P) -> ProblemId {
        self.problems.push(Some(Box::new(problem)));
        ProblemId(self.problems.len() - 1)
    }

    pub fn add_survey(&mut self, survey: Survey) -> SurveyId {
        self.surveys.push(Some(survey));
        SurveyId(self.surveys.len() - 1)
    }

    /// Unpairs and drops `problem`. Its id then reports
    /// [`ProblemError::UnknownProblem`].
    pub fn remove_problem(&mut self, problem: ProblemId) -> Result<Box<dyn Problem>, ProblemError> {
        let removed = self
            .problems
            .get_mut(problem.0)
            .and_then(Option::take)
            .ok_or(ProblemError::UnknownProblem(problem.0))?;
        self.unpair(problem);
        debug!("removed {problem:?}");
        Ok(removed)
    }

    /// Unpairs and drops `survey`, handing it back. Its id then reports
    /// [`ProblemError::UnknownSurvey`].
    pub fn remove_survey(&mut self, survey: SurveyId) -> Result<Survey, ProblemError> {
        let removed = self
            .surveys
            .get_mut(survey.0)
            .and_then(Option::take)
            .ok_or(ProblemError::UnknownSurvey(survey.0))?;
        self.unpair_survey(survey);
        debug!("removed {survey:?}");
        Ok(removed)
    }

    /// Number of problems currently held.
    pub fn n_problems(&self) -> usize {
        self.problems.iter().flatten().count()
    }

    /// Number of surveys currently held.
    pub fn n_surveys(&self) -> usize {
        self.surveys.iter().flatten().count()
    }

    pub fn problem(&self, id: ProblemId) -> Result<&dyn Problem, ProblemError> {
        self.problems
            .get(id.0)
            .and_then(Option::as_deref)
            .ok_or(ProblemError::UnknownProblem(id.0))
    }

    pub fn survey(&self, id: SurveyId) -> Result<&Survey, ProblemError> {
        self.surveys
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ProblemError::UnknownSurvey(id.0))
    }

    pub fn survey_mut(&mut self, id: SurveyId) -> Result<&mut Survey, ProblemError> {
        self.surveys
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ProblemError::UnknownSurvey(id.0))
    }

    /// Pairs `survey` with `problem`.
    ///
    /// Fails with [`ProblemError::TypeMismatch`] if the survey kind does not
    /// satisfy the problem's declared kind, and with
    /// [`ProblemError::AlreadyPaired`] if the survey belongs to another
    /// problem. A survey the problem was previously paired with is released.
    /// Pairing an already paired couple again is a no-op. On failure nothing
    /// changes.
    pub fn pair(&mut self, problem: ProblemId, survey: SurveyId) -> Result<(), ProblemError> {
        let required = self.problem(problem)?.survey_kind();
        let found = self.survey(survey)?.kind();
        if !found.satisfies(required) {
            return Err(ProblemError::TypeMismatch {
                expected: required.to_string(),
                found: found.to_string(),
            });
        }

        match self.problem_of.get(&survey) {
            Some(owner) if *owner == problem => return Ok(()),
            Some(_) => return Err(ProblemError::AlreadyPaired),
            None => {}
        }

        if let Some(previous) = self.survey_of.remove(&problem) {
            self.problem_of.remove(&previous);
            debug!("{problem:?} released {previous:?}");
        }

        self.survey_of.insert(problem, survey);
        self.problem_of.insert(survey, problem);
        debug!("paired {problem:?} with {survey:?}");
        Ok(())
    }

    /// Clears the pairing of `problem`, if any.
    pub fn unpair(&mut self, problem: ProblemId) {
        if let Some(survey) = self.survey_of.remove(&problem) {
            self.problem_of.remove(&survey);
            debug!("unpaired {problem:?} from {survey:?}");
        }
    }

    /// Clears the pairing of `survey`, if any.
    pub fn unpair_survey(&mut self, survey: SurveyId) {
        if let Some(problem) = self.problem_of.get(&survey).copied() {
            self.unpair(problem);
        }
    }

    pub fn is_paired(&self, problem: ProblemId) -> bool {
        self.survey_of.contains_key(&problem)
    }

    pub fn survey_of(&self, problem: ProblemId) -> Option<SurveyId> {
        self.survey_of.get(&problem).copied()
    }

    pub fn problem_of(&self, survey: SurveyId) -> Option<ProblemId> {
        self.problem_of.get(&survey).copied()
    }

    fn paired(&self, problem: ProblemId) -> Result<(&dyn Problem, &Survey), ProblemError> {
        let p = self.problem(problem)?;
        let survey = self.survey_of(problem).ok_or(ProblemError::NotPaired)?;
        Ok((p, self.survey(survey)?))
    }

    fn timer(&self, label: &'static str) -> TimerGuard<'_> {
        TimerGuard::start(self.metrics.as_ref(), label)
    }

    /// Fields `u(m)` of `problem`; does not need a pairing.
    pub fn fields(&self, problem: ProblemId, m: &DVector<f64>) -> Result<Option<Fields>, ProblemError> {
        let p = self.problem(problem)?;
        let _timer = self.timer("fields");
        p.fields(m)
    }

    /// Predicted data `P u(m)` of `survey` through its paired problem.
    /// Fields are computed from `m` when `u` is `None`.
    pub fn dpred(
        &self,
        survey: SurveyId,
        m: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let s = self.survey(survey)?;
        let problem = self.problem_of(survey).ok_or(ProblemError::NotPaired)?;
        let p = self.problem(problem)?;
        let computed;
        let fields = match u {
            Some(fields) => fields,
            None => {
                let _timer = self.timer("fields");
                computed = p.fields(m)?.ok_or(ProblemError::NotImplemented("fields"))?;
                &computed
            }
        };
        s.project_fields(fields)
    }

    /// `dpred(m, u) - dobs`.
    pub fn data_residual(
        &self,
        survey: SurveyId,
        m: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let dpred = self.dpred(survey, m, u)?;
        self.survey(survey)?.residual(&dpred)
    }

    pub fn jvec(
        &self,
        problem: ProblemId,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let (p, survey) = self.paired(problem)?;
        let _timer = self.timer("jvec");
        p.jvec(survey, m, v, u)
    }

    pub fn jtvec(
        &self,
        problem: ProblemId,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let (p, survey) = self.paired(problem)?;
        let _timer = self.timer("jtvec");
        p.jtvec(survey, m, v, u)
    }

    pub fn jvec_approx(
        &self,
        problem: ProblemId,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let (p, survey) = self.paired(problem)?;
        let _timer = self.timer("jvec_approx");
        p.jvec_approx(survey, m, v, u)
    }

    pub fn jtvec_approx(
        &self,
        problem: ProblemId,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let (p, survey) = self.paired(problem)?;
        let _timer = self.timer("jtvec_approx");
        p.jtvec_approx(survey, m, v, u)
    }

    /// Builds a survey from `geometry`, pairs it with `problem` and fills it
    /// with synthetic data for the model `m`.
    ///
    /// `dobs = dtrue + std * |dtrue| * N(0, 1)`, drawn independently per
    /// datum from `rng`; the survey's `std` is `std` for every datum. A
    /// survey previously paired with `problem` is released. On failure
    /// nothing is added or paired.
    pub fn create_synthetic_data<R: Rng + ?Sized>(
        &mut self,
        problem: ProblemId,
        m: &DVector<f64>,
        std: f64,
        u: Option<&Fields>,
        geometry: &SurveyGeometry,
        rng: &mut R,
    ) -> Result<SurveyId, ProblemError> {
        if !(std.is_finite() && std >= 0.0) {
            return Err(ProblemError::InvalidConfig(format!(
                "std must be finite and non-negative, got {std}"
            )));
        }

        let p = self.problem(problem)?;
        let mut survey = Survey::new(p.survey_kind(), geometry, p.mesh())?;

        let computed;
        let fields = match u {
            Some(fields) => fields,
            None => {
                let _timer = self.timer("fields");
                computed = p.fields(m)?.ok_or(ProblemError::NotImplemented("fields"))?;
                &computed
            }
        };
        let dtrue = survey.project_fields(fields)?;

        let noise = DVector::from_fn(dtrue.len(), |i, _| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            std * dtrue[i].abs() * z
        });

        survey.mtrue = Some(m.clone());
        survey.dobs = Some(&dtrue + noise);
        survey.std = Some(DVector::from_element(dtrue.len(), std));
        survey.dtrue = Some(dtrue);

        let nd = survey.nd();
        let id = self.add_survey(survey);
        self.pair(problem, id)?;
        info!("created synthetic survey {id:?} with {nd} data (std = {std})");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_uniform_line_mesh;
    use crate::model::{Mapping, Model};
    use crate::problem::BaseProblem;
    use crate::problem::diffusion::{DiffusionConfig, DiffusionProblem, PointSource};
    use crate::survey::SurveyKind;
    use std::sync::Arc;

    fn mesh() -> Arc<crate::discretization::mesh::Mesh> {
        Arc::new(create_uniform_line_mesh(1.0, 4, 1.0))
    }

    fn base_problem() -> BaseProblem {
        BaseProblem::new(Model::mapped(Mapping::Identity, mesh())).unwrap()
    }

    fn diffusion_problem() -> DiffusionProblem {
        DiffusionProblem::new(
            Model::mapped(Mapping::Exp, mesh()),
            DiffusionConfig {
                sources: vec![PointSource {
                    cell: 1,
                    strength: 1.0,
                }],
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn survey(kind: SurveyKind) -> Survey {
        Survey::new(kind, &SurveyGeometry::cells(vec![0, 2]), &mesh()).unwrap()
    }

    #[test]
    fn pair_and_unpair_are_symmetric() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));

        registry.pair(p, s).unwrap();
        assert!(registry.is_paired(p));
        assert_eq!(registry.survey_of(p), Some(s));
        assert_eq!(registry.problem_of(s), Some(p));

        registry.unpair(p);
        assert!(!registry.is_paired(p));
        assert_eq!(registry.problem_of(s), None);

        registry.unpair(p);
        assert!(!registry.is_paired(p));
    }

    #[test]
    fn survey_owned_elsewhere_is_rejected_without_changes() {
        let mut registry = PairingRegistry::new();
        let first = registry.add_problem(base_problem());
        let second = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(first, s).unwrap();

        assert_eq!(registry.pair(second, s), Err(ProblemError::AlreadyPaired));
        assert_eq!(registry.survey_of(first), Some(s));
        assert_eq!(registry.problem_of(s), Some(first));
        assert!(!registry.is_paired(second));
    }

    #[test]
    fn repairing_same_couple_is_a_no_op() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();
        assert_eq!(registry.pair(p, s), Ok(()));
        assert_eq!(registry.survey_of(p), Some(s));
    }

    #[test]
    fn new_survey_releases_previous_one() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let old = registry.add_survey(survey(SurveyKind::Base));
        let new = registry.add_survey(survey(SurveyKind::Potential));

        registry.pair(p, old).unwrap();
        registry.pair(p, new).unwrap();

        assert_eq!(registry.survey_of(p), Some(new));
        assert_eq!(registry.problem_of(old), None);
        assert_eq!(registry.problem_of(new), Some(p));
    }

    #[test]
    fn survey_kind_is_checked() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(diffusion_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));

        let err = registry.pair(p, s).unwrap_err();
        assert_eq!(
            err,
            ProblemError::TypeMismatch {
                expected: "potential survey".into(),
                found: "base survey".into(),
            }
        );
        assert!(!registry.is_paired(p));
    }

    #[test]
    fn unpair_survey_clears_both_sides() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();

        registry.unpair_survey(s);

        assert!(!registry.is_paired(p));
        assert_eq!(registry.problem_of(s), None);
    }

    #[test]
    fn sensitivities_need_a_pairing() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(diffusion_problem());
        let m = DVector::zeros(4);
        let v = DVector::zeros(4);

        assert_eq!(registry.jvec(p, &m, &v, None), Err(ProblemError::NotPaired));
        assert_eq!(registry.jtvec(p, &m, &v, None), Err(ProblemError::NotPaired));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        assert_eq!(
            registry.pair(p, SurveyId(7)),
            Err(ProblemError::UnknownSurvey(7))
        );
        assert!(matches!(
            registry.problem(ProblemId(3)),
            Err(ProblemError::UnknownProblem(3))
        ));
    }

    #[test]
    fn removed_survey_id_is_unknown() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();

        let removed = registry.remove_survey(s).unwrap();

        assert_eq!(removed.nd(), 2);
        assert!(!registry.is_paired(p));
        assert_eq!(registry.problem_of(s), None);
        assert_eq!(registry.n_surveys(), 0);
        assert!(matches!(registry.survey(s), Err(ProblemError::UnknownSurvey(0))));
        assert_eq!(registry.pair(p, s), Err(ProblemError::UnknownSurvey(0)));
        assert!(matches!(registry.remove_survey(s), Err(ProblemError::UnknownSurvey(0))));

        // ids are not reused
        let next = registry.add_survey(survey(SurveyKind::Base));
        assert_ne!(next, s);
        assert!(registry.survey(s).is_err());
    }

    #[test]
    fn removed_problem_releases_its_survey() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();

        registry.remove_problem(p).unwrap();

        assert_eq!(registry.problem_of(s), None);
        assert_eq!(registry.n_problems(), 0);
        assert!(matches!(registry.problem(p), Err(ProblemError::UnknownProblem(0))));
        assert_eq!(
            registry.jvec(p, &DVector::zeros(4), &DVector::zeros(4), None),
            Err(ProblemError::UnknownProblem(0))
        );

        let other = registry.add_problem(base_problem());
        registry.pair(other, s).unwrap();
        assert_eq!(registry.problem_of(s), Some(other));
    }

    #[test]
    fn sensitivity_calls_are_timed_even_when_they_fail() {
        let counter = Rc::new(Counter::new());
        let mut registry = PairingRegistry::with_metrics(counter.clone());
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();
        let m = DVector::zeros(4);

        let result = registry.jvec(p, &m, &DVector::zeros(4), None);

        assert_eq!(result, Err(ProblemError::NotImplemented("jvec")));
        assert_eq!(counter.count("jvec"), 1);
        assert_eq!(counter.count("jtvec"), 0);
    }

    #[test]
    fn dpred_of_base_problem_is_not_implemented() {
        let mut registry = PairingRegistry::new();
        let p = registry.add_problem(base_problem());
        let s = registry.add_survey(survey(SurveyKind::Base));
        registry.pair(p, s).unwrap();

        assert_eq!(
            registry.dpred(s, &DVector::zeros(4), None),
            Err(ProblemError::NotImplemented("fields"))
        );

        let u = Fields::new(DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(
            registry.dpred(s, &DVector::zeros(4), Some(&u)),
            Ok(DVector::from_vec(vec![1.0, 3.0]))
        );
    }
}
