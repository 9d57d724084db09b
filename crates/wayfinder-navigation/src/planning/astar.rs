/*

A* = f(n) = g(n) + h(n)

Where:
    n = a cell of the occupancy grid
    g(n) = cheapest known cost from the source to n (sum of edge costs)
    h(n) = straight-line distance to the target times the minimum move cost
    f(n) = estimated cost of the cheapest route through n

Entries are never removed from the frontier when a cheaper route to the same
cell turns up; the cheaper entry is pushed alongside and stale entries fail
the improvement check when they are popped.

*/

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::GridPoint;
use crate::map::OccupancyGrid;

/// Represents the result of an A* search with metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathResult {
    /// Cells from the first step after the source up to and including the
    /// target. Empty when no path exists or source and target coincide.
    pub path: Vec<GridPoint>,
    /// Total edge cost of the path, if one was found.
    pub total_cost: Option<f32>,
    /// The number of frontier entries popped during the search.
    pub nodes_explored: usize,
}

impl PathResult {
    /// Creates a new PathResult for a successful search.
    pub fn success(path: Vec<GridPoint>, total_cost: f32, nodes_explored: usize) -> Self {
        PathResult { path, total_cost: Some(total_cost), nodes_explored }
    }

    /// Creates a new PathResult for a failed search.
    pub fn failure(nodes_explored: usize) -> Self {
        PathResult { path: Vec::new(), total_cost: None, nodes_explored }
    }

    /// Returns true if a path was found.
    pub fn is_success(&self) -> bool {
        self.total_cost.is_some()
    }

    /// Returns the path, empty on failure.
    pub fn into_path(self) -> Vec<GridPoint> {
        self.path
    }
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total_cost {
            Some(cost) => write!(
                f,
                "PathResult {{ success: true, path_length: {}, total_cost: {:.3}, nodes_explored: {} }}",
                self.path.len(),
                cost,
                self.nodes_explored
            ),
            None => write!(f, "PathResult {{ success: false, nodes_explored: {} }}", self.nodes_explored),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct State {
    priority: f32,
    sequence: u64,
    position: GridPoint,
}

// Min-heap on priority; equal priorities pop in insertion order.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

fn reconstruct_path(came_from: &HashMap<GridPoint, GridPoint>, source: GridPoint, target: GridPoint) -> Vec<GridPoint> {
    let mut path = Vec::new();
    let mut current = target;
    while current != source {
        path.push(current);
        match came_from.get(&current) {
            Some(&previous) => current = previous,
            None => unreachable!("predecessor chain broken at {current}"),
        }
    }
    path.reverse();
    path
}

/// Finds the cheapest 8-connected path from `source` to `target`.
///
/// # Arguments
/// * `grid` - Cost field supplying edge costs and the heuristic
/// * `source` - Start cell; it is never part of the returned path
/// * `target` - Goal cell
///
/// # Returns
/// * `PathResult` - The path and its cost, or a failure carrying the search effort
pub fn astar_search(grid: &OccupancyGrid, source: GridPoint, target: GridPoint) -> PathResult {
    if source == target {
        return PathResult::success(Vec::new(), 0.0, 0);
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<GridPoint, GridPoint> = HashMap::new();
    let mut best_cost: HashMap<GridPoint, f32> = HashMap::new();
    let mut sequence = 0_u64;
    let mut nodes_explored = 0;

    best_cost.insert(source, 0.0);
    frontier.push(State { priority: 0.0, sequence, position: source });

    while let Some(State { position: current, .. }) = frontier.pop() {
        nodes_explored += 1;
        if current == target {
            break;
        }
        let current_cost = best_cost[&current];

        for next in grid.neighbors(current) {
            let Some(edge) = grid.edge_cost(current, next) else {
                continue;
            };
            let new_cost = current_cost + edge;
            if best_cost.get(&next).is_none_or(|&old| new_cost < old) {
                best_cost.insert(next, new_cost);
                came_from.insert(next, current);
                sequence += 1;
                frontier.push(State { priority: new_cost + grid.heuristic(next, target), sequence, position: next });
            }
        }
    }

    match best_cost.get(&target) {
        Some(&cost) => PathResult::success(reconstruct_path(&came_from, source, target), cost, nodes_explored),
        None => PathResult::failure(nodes_explored),
    }
}
