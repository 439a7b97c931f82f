//! Statistic, bivariate and transform descriptors.
//!
//! These operators carry no callback: the evaluator computes them from the
//! statistic engines so that aggregates over references can be cached per
//! recalculation pass.

use livetab_common::DataType;
use livetab_parse::{BivariateStatistic, Operator, OperatorCatalog, Statistic, Transform};

pub fn register_builtins(cat: &mut OperatorCatalog) {
    let stats = [
        ("sum", Statistic::Sum),
        ("mean", Statistic::Mean),
        ("avg", Statistic::Mean),
        ("median", Statistic::Median),
        ("mode", Statistic::Mode),
        ("var", Statistic::Variance),
        ("varp", Statistic::VarianceP),
        ("stdev", Statistic::StdDev),
        ("stdevp", Statistic::StdDevP),
        ("skew", Statistic::Skew),
        ("min", Statistic::Min),
        ("max", Statistic::Max),
        ("range", Statistic::Range),
        ("count", Statistic::Count),
    ];
    for (label, s) in stats {
        cat.insert(Operator::statistic(label, s).arg_types([DataType::Any]));
    }

    let pairs = [
        ("covar", BivariateStatistic::Covariance),
        ("correl", BivariateStatistic::Correlation),
        ("slope", BivariateStatistic::Slope),
        ("intercept", BivariateStatistic::Intercept),
        ("rsq", BivariateStatistic::RSquared),
    ];
    for (label, s) in pairs {
        cat.insert(Operator::bivariate(label, s));
    }

    for (label, t) in [
        ("meancenter", Transform::MeanCenter),
        ("normalize", Transform::Normalize),
        ("scale", Transform::Scale),
    ] {
        cat.insert(Operator::transform(label, t));
    }
}
