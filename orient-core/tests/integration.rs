//! Integration Tests for the Resolution Engine
//!
//! These tests build small equation networks end to end: wiring, source
//! declaration, propagation, graph queries and evaluation through the
//! runtime.

use std::f64::consts::PI;

use orient_core::graph::{Arity, Direction, EquationSpec, Known, Network, NodeId};
use orient_core::export;
use orient_core::runtime::{bind, calculation, Calculation, Outcome};
use orient_core::Error;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// alpha + beta + gamma = PI, solvable for any one angle.
fn angle_sum(net: &mut Network) -> ([NodeId; 3], NodeId) {
    let vars = net.add_variables(["alpha", "beta", "gamma"]);
    let sum = net
        .add_equation(
            EquationSpec::new("alpha+beta+gamma=PI")
                .candidates(vars.clone())
                .factory(|key| {
                    let index: usize = key.parse().ok()?;
                    Some(calculation(move |inputs| {
                        let mut rest = PI;
                        for (key, value) in inputs.iter() {
                            if key.parse::<usize>().ok() != Some(index) {
                                rest -= value;
                            }
                        }
                        Ok(Outcome::from(rest))
                    }))
                }),
        )
        .unwrap();
    ([vars[0], vars[1], vars[2]], sum)
}

/// Two deferred angles resolve the third and evaluate through the runtime.
#[test]
fn angle_sum_resolves_third_angle() {
    let mut net = Network::new();
    let ([alpha, beta, gamma], sum) = angle_sum(&mut net);

    net.mark_as_source_deferred(alpha, None).unwrap();
    net.mark_as_source_deferred(beta, None).unwrap();
    let graph = net.connected_component(alpha).unwrap();
    net.resolve_edges(graph.edges());

    assert_eq!(net.variable(alpha).unwrap().known(), Known::Source);
    assert_eq!(net.variable(beta).unwrap().known(), Known::Source);
    assert_eq!(net.variable(gamma).unwrap().known(), Known::Computed);

    let source = net.variable(gamma).unwrap().source_edge().unwrap();
    assert_eq!(net.edge(source).unwrap().equation(), sum);
    assert!(net.is_used(sum).unwrap());

    let report = net.report(sum).unwrap();
    assert_eq!(report.output_key, "2");
    assert_eq!(report.outputs, vec![(gamma, "2".to_string())]);
    let inputs: Vec<NodeId> = report.inputs.iter().map(|(v, _)| *v).collect();
    assert_eq!(inputs.len(), 2);
    assert!(inputs.contains(&alpha) && inputs.contains(&beta));

    let bound = bind(&net, &graph).unwrap();
    assert_eq!(bound.inputs().len(), 2);
    assert_eq!(bound.all().len(), 3);

    bound.input(alpha).unwrap().set(PI / 2.0);
    bound.input(beta).unwrap().set(PI / 3.0);
    assert_close(bound.value(gamma).unwrap(), PI / 6.0);
}

/// x + y = a, x - y = b, solved jointly for any two unknowns.
fn linear_system(net: &mut Network) -> [NodeId; 4] {
    let [x, y, a, b] = [
        net.add_variable("x"),
        net.add_variable("y"),
        net.add_variable("a"),
        net.add_variable("b"),
    ];
    let factory = |key: &str| -> Option<Calculation> {
        let calc: Calculation = match key {
            "a,b" => calculation(|i| {
                let (x, y) = (i.get("x")?, i.get("y")?);
                Ok(Outcome::from([("a", x + y), ("b", x - y)]))
            }),
            "a,x" => calculation(|i| {
                let (b, y) = (i.get("b")?, i.get("y")?);
                Ok(Outcome::from([("x", b + y), ("a", b + y + y)]))
            }),
            "a,y" => calculation(|i| {
                let (b, x) = (i.get("b")?, i.get("x")?);
                Ok(Outcome::from([("y", x - b), ("a", x + x - b)]))
            }),
            "b,x" => calculation(|i| {
                let (a, y) = (i.get("a")?, i.get("y")?);
                Ok(Outcome::from([("x", a - y), ("b", a - y - y)]))
            }),
            "b,y" => calculation(|i| {
                let (a, x) = (i.get("a")?, i.get("x")?);
                Ok(Outcome::from([("y", a - x), ("b", x - (a - x))]))
            }),
            "x,y" => calculation(|i| {
                let (a, b) = (i.get("a")?, i.get("b")?);
                Ok(Outcome::from([("x", (a + b) / 2.0), ("y", (a - b) / 2.0)]))
            }),
            _ => return None,
        };
        Some(calc)
    };
    net.add_equation(
        EquationSpec::new("system")
            .arity(Arity::Count(2))
            .candidates([("x", x), ("y", y), ("a", a), ("b", b)])
            .factory(factory),
    )
    .unwrap();
    [x, y, a, b]
}

/// Any two knowns of the 2x2 system determine the other two.
#[test]
fn linear_system_every_known_pair() {
    let names = ["x", "y", "a", "b"];
    let truth = [1.0, 2.0, 3.0, -1.0];
    let pairs = [("a", "b"), ("a", "x"), ("a", "y"), ("b", "x"), ("b", "y"), ("x", "y")];

    for (first, second) in pairs {
        let mut net = Network::new();
        let vars = linear_system(&mut net);
        let index = |name: &str| names.iter().position(|n| *n == name).unwrap();
        let known = [index(first), index(second)];

        for &i in &known {
            net.mark_as_source(vars[i], None).unwrap();
        }

        let mut expected_outputs: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !known.contains(i))
            .map(|(_, n)| *n)
            .collect();
        expected_outputs.sort_unstable();
        let system = net.equations().next().unwrap();
        assert_eq!(net.report(system).unwrap().output_key, expected_outputs.join(","));

        for (i, var) in vars.iter().enumerate() {
            let expected = if known.contains(&i) { Known::Source } else { Known::Computed };
            assert_eq!(net.variable(*var).unwrap().known(), expected, "{first},{second}: {}", names[i]);
        }

        let graph = net.connected_component(vars[0]).unwrap();
        let bound = bind(&net, &net.used_subgraph(&graph)).unwrap();
        for &i in &known {
            bound.input(vars[i]).unwrap().set(truth[i]);
        }
        for (i, var) in vars.iter().enumerate() {
            assert_close(bound.value(*var).unwrap(), truth[i]);
        }
    }
}

/// Jointly solved outputs come from a single calculation run.
#[test]
fn linear_system_rederives_sources() {
    let mut net = Network::new();
    let [x, y, a, b] = linear_system(&mut net);
    net.mark_as_source(a, None).unwrap();
    net.mark_as_source(b, None).unwrap();

    let bound = bind(&net, &net.connected_component(a).unwrap()).unwrap();
    bound.input(a).unwrap().set(3.0);
    bound.input(b).unwrap().set(-1.0);
    assert_close(bound.value(x).unwrap(), 1.0);
    assert_close(bound.value(y).unwrap(), 2.0);

    let system = net.equations().next().unwrap();
    assert_eq!(bound.memo(system).unwrap().compute_count(), 1);
}

/// Law of cosines: the enclosed angle is mandatory, any one side may be
/// computed from the other two.
#[test]
fn prerequisite_gates_law_of_cosines() {
    let mut net = Network::new();
    let [a, b, c, angle] = [
        net.add_variable("a"),
        net.add_variable("b"),
        net.add_variable("c"),
        net.add_variable("C"),
    ];
    let cosines = net
        .add_equation(
            EquationSpec::new("c^2=a^2+b^2-2ab*cos(C)")
                .candidates([("a", a), ("b", b), ("c", c)])
                .prerequisites([("C", angle)])
                .factory(|key| match key {
                    "c" => Some(calculation(|i| {
                        let (a, b, angle) = (i.get("a")?, i.get("b")?, i.get("C")?);
                        Ok(Outcome::from((a * a + b * b - 2.0 * a * b * angle.cos()).sqrt()))
                    })),
                    _ => None,
                }),
        )
        .unwrap();

    net.mark_as_source(a, None).unwrap();
    net.mark_as_source(b, None).unwrap();
    assert!(!net.equation(cosines).unwrap().is_known());
    assert!(matches!(net.report(cosines), Err(Error::Unresolved { .. })));

    net.mark_as_source(angle, None).unwrap();
    assert_eq!(net.variable(c).unwrap().known(), Known::Computed);
    assert_eq!(net.report(cosines).unwrap().output_key, "c");

    let bound = bind(&net, &net.connected_component(a).unwrap()).unwrap();
    bound.input(a).unwrap().set(3.0);
    bound.input(b).unwrap().set(4.0);
    bound.input(angle).unwrap().set(PI / 2.0);
    assert_close(bound.value(c).unwrap(), 5.0);
}

/// A predicate arity refuses combinations it cannot solve.
#[test]
fn predicate_arity_controls_solvable_combinations() {
    let mut net = Network::new();
    let vars = net.add_variables(["p", "q", "r"]);
    // Only `r` may be solved for.
    let eq = net
        .add_equation(
            EquationSpec::new("r=f(p,q)")
                .arity(Arity::predicate(|pending| pending.is_empty() || pending == ["r"]))
                .candidates([("p", vars[0]), ("q", vars[1]), ("r", vars[2])]),
        )
        .unwrap();

    net.mark_as_source(vars[2], None).unwrap();
    net.mark_as_source(vars[1], None).unwrap();
    assert!(!net.equation(eq).unwrap().is_known());

    net.mark_as_source(vars[0], None).unwrap();
    assert!(net.equation(eq).unwrap().is_known());
    assert_eq!(net.report(eq).unwrap().output_key, "");
    assert!(!net.is_used(eq).unwrap());
}

/// Topology is frozen once an equation is built, resolved or not.
#[test]
fn adding_edges_after_construction_always_fails() {
    let mut net = Network::new();
    let ([alpha, _, gamma], sum) = angle_sum(&mut net);
    let extra = net.add_variable("delta");
    let other = net
        .add_equation(EquationSpec::new("delta=gamma").candidates([gamma, extra]))
        .unwrap();

    net.mark_as_source(alpha, None).unwrap();
    for (equation, variable) in [(sum, extra), (sum, alpha), (other, alpha)] {
        assert!(matches!(
            net.add_edge(equation, variable, "late"),
            Err(Error::Lifecycle { .. })
        ));
    }
}

/// Levels span the shallowest and deepest inputs, one step down.
#[test]
fn levels_follow_computation_order() {
    let mut net = Network::new();
    let [x, y, z, w] = [
        net.add_variable("x"),
        net.add_variable("y"),
        net.add_variable("z"),
        net.add_variable("w"),
    ];
    let first = net.add_equation(EquationSpec::new("y=f(x)").candidates([x, y])).unwrap();
    let second = net
        .add_equation(EquationSpec::new("z=g(x,y)").candidates([x, y, z]))
        .unwrap();
    assert!(matches!(net.level(w), Err(Error::UnusedNode { .. })));

    net.mark_as_source(x, None).unwrap();

    assert_eq!(net.level(x).unwrap(), [0, 0]);
    assert_eq!(net.level(first).unwrap(), [1, 1]);
    assert_eq!(net.level(y).unwrap(), [1, 1]);
    assert_eq!(net.level(second).unwrap(), [1, 2]);
    assert_eq!(net.level(z).unwrap(), [1, 2]);
    assert!(matches!(net.level(w), Err(Error::UnusedNode { .. })));
}

/// A variable one equation away from two sources sits at level one.
#[test]
fn two_sources_one_hop_is_level_one() {
    let mut net = Network::new();
    let ([alpha, beta, gamma], sum) = angle_sum(&mut net);
    net.mark_as_source(alpha, None).unwrap();
    net.mark_as_source(beta, None).unwrap();

    assert_eq!(net.level(alpha).unwrap(), [0, 0]);
    assert_eq!(net.level(sum).unwrap(), [1, 1]);
    assert_eq!(net.level(gamma).unwrap(), [1, 1]);
}

/// An equation with nothing left to compute drops out of the used graph.
#[test]
fn equation_over_known_variables_is_not_used() {
    let mut net = Network::new();
    let ([alpha, beta, _], sum) = angle_sum(&mut net);
    net.mark_as_source(alpha, None).unwrap();
    net.mark_as_source(beta, None).unwrap();

    let check = net
        .add_equation(EquationSpec::new("alpha=beta").candidates([alpha, beta]))
        .unwrap();
    net.resolve();

    assert!(net.equation(check).unwrap().is_known());
    assert!(net.equation(check).unwrap().result().unwrap().is_empty());

    let graph = net.connected_component(alpha).unwrap();
    let used = net.used_subgraph(&graph);
    assert!(used.contains_node(sum));
    assert!(!used.contains_node(check));
    for &edge in net.equation(check).unwrap().edges() {
        assert!(!used.contains_edge(edge));
    }
    assert_eq!(net.used_subgraph(&used), used);
}

/// Of two equations racing for one output, only the first delivery is used.
#[test]
fn losing_equation_is_not_used() {
    let mut net = Network::new();
    let [a, b, c] = [net.add_variable("a"), net.add_variable("b"), net.add_variable("c")];
    let winner = net.add_equation(EquationSpec::new("c=f(a,b)").candidates([a, b, c])).unwrap();
    let loser = net.add_equation(EquationSpec::new("c=g(a)").candidates([a, c])).unwrap();

    net.mark_as_source(b, None).unwrap();
    net.mark_as_source(a, None).unwrap();

    // Both equations picked `c`; the first delivery wins.
    assert!(net.equation(loser).unwrap().is_known());
    let source = net.variable(c).unwrap().source_edge().unwrap();
    assert_eq!(net.edge(source).unwrap().equation(), winner);

    let used = net.used_subgraph(&net.connected_component(a).unwrap());
    assert!(used.contains_node(winner));
    assert!(!used.contains_node(loser));
    assert_eq!(used.nodes().len(), 4);
    assert_eq!(used.edges().len(), 3);
    assert!(matches!(net.level(loser), Err(Error::UnusedNode { .. })));
}

/// Re-marking a known variable fails and leaves every direction alone.
#[test]
fn directions_never_change_twice() {
    let mut net = Network::new();
    let ([alpha, beta, gamma], _) = angle_sum(&mut net);
    net.mark_as_source(alpha, None).unwrap();
    net.mark_as_source(beta, None).unwrap();
    let before: Vec<Direction> = net.edges().map(|e| e.direction()).collect();

    assert!(matches!(net.mark_as_source(gamma, None), Err(Error::AlreadyResolved { .. })));
    net.resolve();
    let after: Vec<Direction> = net.edges().map(|e| e.direction()).collect();
    assert_eq!(before, after);
}

/// Variables can be created from JSON names or a count.
#[test]
fn bulk_creation_from_json() {
    let mut net = Network::new();
    let names = serde_json::json!(["u", "v"]);
    let vars = net.add_variables(orient_core::graph::VariableNames::try_from(&names).unwrap());
    assert_eq!(net.node(vars[1]).unwrap().name(), "v");

    let counted = net.add_variables(3usize);
    assert_eq!(net.node(counted[2]).unwrap().name(), "2");

    let bad = serde_json::json!({"u": 1});
    assert!(matches!(
        orient_core::graph::VariableNames::try_from(&bad),
        Err(Error::InvalidArgument(_))
    ));
}

/// A triangle's sides and angles, linked by the angle sum, three laws of
/// sines and three laws of cosines.
struct Triangle {
    sides: [NodeId; 3],
    angles: [NodeId; 3],
    angle_sum: NodeId,
    sin_ab: NodeId,
    sin_ac: NodeId,
    sin_bc: NodeId,
    cos_c: NodeId,
    cos_b: NodeId,
    cos_a: NodeId,
}

fn triangle(net: &mut Network) -> Triangle {
    let [a, b, c] = [net.add_variable("a"), net.add_variable("b"), net.add_variable("c")];
    let [alpha, beta, gamma] = [
        net.add_variable("alpha"),
        net.add_variable("beta"),
        net.add_variable("gamma"),
    ];

    // Law of sines, solved for the angle opposite the first side.
    let sines = |key: &str| match key {
        "2" => Some(calculation(|i| {
            let (side, other, angle) = (i.get("0")?, i.get("1")?, i.get("3")?);
            Ok(Outcome::from((side * angle.sin() / other).asin()))
        })),
        _ => None,
    };
    let mut add = |name: &str, vars: [NodeId; 4]| {
        net.add_equation(EquationSpec::new(name).candidates(vars).factory(sines))
            .unwrap()
    };
    let sin_ab = add("a/sin(alpha)=b/sin(beta)", [a, b, alpha, beta]);
    let sin_ac = add("a/sin(alpha)=c/sin(gamma)", [a, c, alpha, gamma]);
    let sin_bc = add("b/sin(beta)=c/sin(gamma)", [b, c, beta, gamma]);

    let angle_sum = net
        .add_equation(EquationSpec::new("alpha+beta+gamma=PI").candidates([alpha, beta, gamma]))
        .unwrap();
    let cos_c = net
        .add_equation(
            EquationSpec::new("c^2=a^2+b^2-2ab*cos(gamma)")
                .candidates([a, b, c, gamma])
                .factory(|key| match key {
                    "2" => Some(calculation(|i| {
                        let (a, b, gamma) = (i.get("0")?, i.get("1")?, i.get("3")?);
                        Ok(Outcome::from((a * a + b * b - 2.0 * a * b * gamma.cos()).sqrt()))
                    })),
                    _ => None,
                }),
        )
        .unwrap();
    let cos_b = net
        .add_equation(EquationSpec::new("b^2=a^2+c^2-2ac*cos(beta)").candidates([a, b, c, beta]))
        .unwrap();
    let cos_a = net
        .add_equation(EquationSpec::new("a^2=b^2+c^2-2bc*cos(alpha)").candidates([a, b, c, alpha]))
        .unwrap();

    Triangle {
        sides: [a, b, c],
        angles: [alpha, beta, gamma],
        angle_sum,
        sin_ab,
        sin_ac,
        sin_bc,
        cos_c,
        cos_b,
        cos_a,
    }
}

/// Two sides and their enclosed angle settle the triangle; equations that
/// lose the race for an angle drop out of the used graph.
#[test]
fn triangle_from_two_sides_and_enclosed_angle() {
    let mut net = Network::new();
    let t = triangle(&mut net);
    let [a, b, c] = t.sides;
    let [alpha, beta, gamma] = t.angles;

    net.mark_as_source(a, None).unwrap();
    net.mark_as_source(b, None).unwrap();
    net.mark_as_source(gamma, None).unwrap();

    for var in t.sides.iter().chain(&t.angles) {
        assert!(net.variable(*var).unwrap().is_known());
    }
    for (var, equation) in [(c, t.cos_c), (alpha, t.sin_ac), (beta, t.sin_bc)] {
        assert_eq!(net.variable(var).unwrap().known(), Known::Computed);
        let suppliers: Vec<_> = net
            .variable(var)
            .unwrap()
            .edges()
            .iter()
            .copied()
            .filter(|e| {
                net.edge(*e).unwrap().direction() == Direction::EquationSupplies && net.edge_is_used(*e).unwrap()
            })
            .collect();
        assert_eq!(suppliers.len(), 1);
        assert_eq!(net.edge(suppliers[0]).unwrap().equation(), equation);
    }

    let used = net.used_subgraph(&net.connected_component(a).unwrap());
    for equation in [t.cos_c, t.sin_ac, t.sin_bc] {
        assert!(used.contains_node(equation));
    }
    for equation in [t.angle_sum, t.sin_ab, t.cos_a, t.cos_b] {
        assert!(net.equation(equation).unwrap().is_known());
        assert!(!used.contains_node(equation));
    }
    assert_eq!(used.nodes().len(), 9);
    assert_eq!(used.edges().len(), 12);

    assert_eq!(net.level(c).unwrap(), [1, 1]);
    assert_eq!(net.level(alpha).unwrap(), [1, 2]);
    assert_eq!(net.level(beta).unwrap(), [1, 2]);

    let bound = bind(&net, &used).unwrap();
    assert_eq!(bound.all().len(), 6);
    assert!(bound.memo(t.cos_a).is_none());
    bound.input(a).unwrap().set(3.0);
    bound.input(b).unwrap().set(4.0);
    bound.input(gamma).unwrap().set(PI / 2.0);
    assert_close(bound.value(c).unwrap(), 5.0);
    assert_close(bound.value(alpha).unwrap(), 0.6f64.asin());
    assert_close(bound.value(beta).unwrap(), 0.8f64.asin());
    assert_close(bound.value(alpha).unwrap() + bound.value(beta).unwrap(), PI / 2.0);
}

/// Deferred sources settle the triangle the same way as immediate ones.
#[test]
fn triangle_resolves_the_same_when_deferred() {
    let mut eager = Network::new();
    let mut lazy = Network::new();
    let t = triangle(&mut eager);
    triangle(&mut lazy);

    for var in [t.sides[0], t.sides[1], t.angles[2]] {
        eager.mark_as_source(var, None).unwrap();
        lazy.mark_as_source_deferred(var, None).unwrap();
    }
    lazy.resolve();

    let directions = |net: &Network| net.edges().map(|e| e.direction()).collect::<Vec<_>>();
    assert_eq!(directions(&eager), directions(&lazy));
    for var in t.sides.iter().chain(&t.angles) {
        assert!(lazy.variable(*var).unwrap().is_known());
    }
}

/// Levels and snapshots of a long chain are computed without deep recursion.
#[test]
fn long_chain_levels_and_snapshot() {
    let mut net = Network::new();
    let vars = net.add_variables(10_000usize);
    for pair in vars.windows(2) {
        net.add_equation(EquationSpec::new("link").candidates([pair[0], pair[1]]))
            .unwrap();
    }
    net.mark_as_source(vars[0], None).unwrap();

    let last = vars[vars.len() - 1];
    let graph = net.connected_component(last).unwrap();
    let snapshot = export::snapshot(&net, &graph).unwrap();
    assert_eq!(snapshot.nodes.len(), 19_999);
    assert!(snapshot.nodes.iter().all(|n| n.used));

    let tail = snapshot.nodes.iter().find(|n| n.id == last).unwrap();
    assert_eq!(tail.level.unwrap(), [9_999, 9_999]);
    assert!(export::to_json(&net, &graph).is_ok());
}
