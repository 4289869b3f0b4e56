//! Graph fixtures shared by the planner tests

use memplan::{DType, Graph, PlanResult, TensorDesc, TensorId};

/// `x -> t1 -> ... -> y` where every tensor holds `elems` f32 values.
///
/// Returns the graph and the tensor ids in chain order.
pub fn chain_graph(len: usize, elems: usize) -> PlanResult<(Graph, Vec<TensorId>)> {
    let mut graph = Graph::new();
    let mut ids = vec![graph.add_tensor(TensorDesc::input("x", vec![elems], DType::F32))];

    for i in 0..len {
        let desc = if i + 1 == len {
            TensorDesc::output("y", vec![elems], DType::F32)
        } else {
            TensorDesc::new(format!("t{}", i + 1), vec![elems], DType::F32)
        };
        let out = graph.add_tensor(desc);
        let prev = ids[ids.len() - 1];
        graph.add_node(format!("op{}", i), vec![prev], vec![out])?;
        ids.push(out);
    }

    Ok((graph, ids))
}

/// Residual block: `x -> a -> b`, `y = add(x, b)`.
///
/// `x` stays live across the whole block, so it can never share storage
/// with `a` or `b`.
pub fn residual_graph(elems: usize) -> PlanResult<(Graph, [TensorId; 4])> {
    let mut graph = Graph::new();
    let x = graph.add_tensor(TensorDesc::input("x", vec![elems], DType::F32));
    let a = graph.add_tensor(TensorDesc::new("a", vec![elems], DType::F32));
    let b = graph.add_tensor(TensorDesc::new("b", vec![elems], DType::F32));
    let y = graph.add_tensor(TensorDesc::output("y", vec![elems], DType::F32));

    graph.add_node("linear1", vec![x], vec![a])?;
    graph.add_node("linear2", vec![a], vec![b])?;
    graph.add_node("add", vec![x, b], vec![y])?;

    Ok((graph, [x, a, b, y]))
}

/// Two-layer MLP with a wide hidden activation.
///
/// `x[d] -> up[4d] -> act[4d] -> down[d]`
pub fn mlp_graph(d: usize) -> PlanResult<(Graph, [TensorId; 4])> {
    let mut graph = Graph::new();
    let x = graph.add_tensor(TensorDesc::input("x", vec![d], DType::F32));
    let up = graph.add_tensor(TensorDesc::new("up", vec![4 * d], DType::F32));
    let act = graph.add_tensor(TensorDesc::new("act", vec![4 * d], DType::F32));
    let down = graph.add_tensor(TensorDesc::output("down", vec![d], DType::F32));

    graph.add_node("up_proj", vec![x], vec![up])?;
    graph.add_node("gelu", vec![up], vec![act])?;
    graph.add_node("down_proj", vec![act], vec![down])?;

    Ok((graph, [x, up, act, down]))
}
