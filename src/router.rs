use fxhash::FxHashMap;
use rayon::prelude::*;
use tracing::info;

use crate::{
    ch::{builder::build_contracted_graph, contracted_graph::ContractedGraph},
    error::RoutingError,
    profile::{Profile, ProfileWeighting, Weight, Weighting},
    resolver::{EdgeIndex, ResolveOptions, Resolver},
    road_graph::RoadGraph,
    route::Route,
    route_builder::{build_route, build_same_edge_route, zero_length_route},
    router_point::RouterPoint,
    search::{
        bidirectional::BidirectionalDijkstra, ch_search::ChBidirectionalDijkstra,
        dijkstra::Dijkstra, EdgePath, SearchDirection,
    },
};

use crate::edge_direction::EdgeDirection;

pub use crate::cancel::CancelToken;

/// Router construction options. The resolver capability and its tuning
/// are fixed here rather than mutated later.
#[derive(Default)]
pub struct RouterOptions {
    pub resolve: ResolveOptions,
    pub resolver: Resolver,
}

/// The routing facade: a read-only road graph, its edge index, the
/// registered profiles and any contraction hierarchies built for them.
///
/// Queries borrow the router immutably and keep all mutable state on
/// their own stack, so a `Router` can serve parallel threads. Building
/// a hierarchy takes `&mut self`, which serializes it against in-flight
/// queries.
pub struct Router {
    graph: RoadGraph,
    index: EdgeIndex,
    profiles: Vec<Box<dyn Profile>>,
    contracted: FxHashMap<String, ContractedGraph>,
    options: RouterOptions,
}

impl Router {
    pub fn new(graph: RoadGraph) -> Self {
        Router::with_options(graph, RouterOptions::default())
    }

    pub fn with_options(graph: RoadGraph, options: RouterOptions) -> Self {
        let index = EdgeIndex::build(&graph);
        Router {
            graph,
            index,
            profiles: Vec::new(),
            contracted: FxHashMap::default(),
            options,
        }
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    /// Registers a profile under its name, replacing a previous profile
    /// of the same name.
    pub fn register_profile(&mut self, profile: Box<dyn Profile>) {
        self.profiles.retain(|known| known.name() != profile.name());
        self.profiles.push(profile);
    }

    /// Builds and caches a contraction hierarchy for the named profile.
    pub fn add_contracted_graph(&mut self, profile_name: &str) -> Result<(), RoutingError> {
        let index = self
            .profiles
            .iter()
            .position(|profile| profile.name() == profile_name)
            .ok_or_else(|| RoutingError::ProfileUnsupported(profile_name.to_string()))?;

        let contracted = {
            let profile = self.profiles[index].as_ref();
            let weighting = ProfileWeighting::new(profile, self.graph.attributes());
            build_contracted_graph(&self.graph, &weighting)?
        };

        info!(profile = profile_name, "registered contraction hierarchy");
        self.contracted.insert(profile_name.to_string(), contracted);
        Ok(())
    }

    pub fn has_contracted_graph(&self, profile_name: &str) -> bool {
        self.contracted.contains_key(profile_name)
    }

    fn profile(&self, name: &str) -> Result<&dyn Profile, RoutingError> {
        self.profiles
            .iter()
            .find(|profile| profile.name() == name)
            .map(|profile| profile.as_ref())
            .ok_or_else(|| RoutingError::ProfileUnsupported(name.to_string()))
    }

    fn check_point(&self, point: &RouterPoint) -> Result<(), RoutingError> {
        if point.edge() >= self.graph.edge_count() {
            return Err(RoutingError::InvariantViolation(format!(
                "resolved point references unknown edge {}",
                point.edge()
            )));
        }
        if !(0.0..=1.0).contains(&point.offset()) {
            return Err(RoutingError::InvariantViolation(format!(
                "resolved point carries offset {} outside [0, 1]",
                point.offset()
            )));
        }
        Ok(())
    }

    /// Resolves a coordinate onto the closest edge traversable by every
    /// named profile.
    pub fn try_resolve(
        &self,
        profile_names: &[&str],
        lat: f64,
        lon: f64,
    ) -> Result<RouterPoint, RoutingError> {
        let profiles = profile_names
            .iter()
            .map(|name| self.profile(name))
            .collect::<Result<Vec<_>, _>>()?;

        match &self.options.resolver {
            Resolver::Custom(resolve) => resolve(lat, lon),
            Resolver::Default => {
                self.index
                    .resolve(&self.graph, &profiles, lat, lon, &self.options.resolve)
            }
        }
    }

    /// Whether the network around `point` extends at least
    /// `radius_weight` in every direction the profile can travel:
    /// `true` iff the search ran out of the radius rather than out of
    /// edges.
    pub fn try_check_connectivity(
        &self,
        profile_name: &str,
        point: &RouterPoint,
        radius_weight: Weight,
    ) -> Result<bool, RoutingError> {
        self.try_check_connectivity_with_cancel(
            profile_name,
            point,
            radius_weight,
            &CancelToken::default(),
        )
    }

    pub fn try_check_connectivity_with_cancel(
        &self,
        profile_name: &str,
        point: &RouterPoint,
        radius_weight: Weight,
        cancel: &CancelToken,
    ) -> Result<bool, RoutingError> {
        let profile = self.profile(profile_name)?;
        self.check_point(point)?;

        let weighting = ProfileWeighting::new(profile, self.graph.attributes());
        let frontier = point.frontier(&self.graph, &weighting, SearchDirection::Forward);
        if frontier.is_empty() {
            return Ok(false);
        }

        let mut search = Dijkstra::with_max_weight(
            &self.graph,
            &weighting,
            SearchDirection::Forward,
            radius_weight,
        );
        for (node, weight) in frontier {
            search.init(node, weight);
        }
        search.run(cancel)?;

        Ok(search.max_reached())
    }

    /// Computes a route between two resolved points. Uses the
    /// contraction hierarchy when one is registered for the profile,
    /// the plain bidirectional engine otherwise.
    pub fn try_calculate(
        &self,
        profile_name: &str,
        source: &RouterPoint,
        target: &RouterPoint,
    ) -> Result<Route, RoutingError> {
        self.try_calculate_with_cancel(profile_name, source, target, &CancelToken::default())
    }

    pub fn try_calculate_with_cancel(
        &self,
        profile_name: &str,
        source: &RouterPoint,
        target: &RouterPoint,
        cancel: &CancelToken,
    ) -> Result<Route, RoutingError> {
        let profile = self.profile(profile_name)?;
        self.check_point(source)?;
        self.check_point(target)?;

        let weighting = ProfileWeighting::new(profile, self.graph.attributes());

        if source.edge() == target.edge() {
            if source.offset() == target.offset() {
                return Ok(zero_length_route(source));
            }

            // Travel within one edge, when the profile allows it,
            // without consulting any engine. Offsets incompatible with
            // the allowed direction fall through and route around.
            let orientation = if target.offset() > source.offset() {
                EdgeDirection::Forward
            } else {
                EdgeDirection::Backward
            };
            let edge = self.graph.edge(source.edge());
            if weighting.edge_weight(edge, orientation).is_some() {
                return build_same_edge_route(&self.graph, &weighting, source, target);
            }
        }

        let source_frontier = source.frontier(&self.graph, &weighting, SearchDirection::Forward);
        let target_frontier = target.frontier(&self.graph, &weighting, SearchDirection::Backward);
        if source_frontier.is_empty() || target_frontier.is_empty() {
            return Err(RoutingError::RouteNotFound(
                "a resolved point is not traversable under the profile".to_string(),
            ));
        }

        let path = self.shortest_path(
            profile_name,
            &weighting,
            &source_frontier,
            &target_frontier,
            cancel,
        )?;

        build_route(&self.graph, &weighting, source, target, &path)
    }

    fn shortest_path<W: Weighting>(
        &self,
        profile_name: &str,
        weighting: &W,
        source_frontier: &[(usize, Weight)],
        target_frontier: &[(usize, Weight)],
        cancel: &CancelToken,
    ) -> Result<EdgePath, RoutingError> {
        match self.contracted.get(profile_name) {
            Some(contracted) => {
                let mut search = ChBidirectionalDijkstra::new(contracted);
                search.init_source(source_frontier);
                search.init_target(target_frontier);
                search.run(cancel)?;
                search.edge_path(contracted, &self.graph)
            }
            None => {
                let mut search = BidirectionalDijkstra::new(&self.graph, weighting);
                search.init_source(source_frontier);
                search.init_target(target_frontier);
                search.run(cancel)?;
                search.edge_path()
            }
        }
    }

    /// Routes every source/target pair independently. Pairs fail
    /// individually; only an unknown profile fails the whole batch.
    pub fn try_calculate_many(
        &self,
        profile_name: &str,
        sources: &[RouterPoint],
        targets: &[RouterPoint],
    ) -> Result<Vec<Vec<Result<Route, RoutingError>>>, RoutingError> {
        self.profile(profile_name)?;

        Ok(sources
            .par_iter()
            .map(|source| {
                targets
                    .iter()
                    .map(|target| self.try_calculate(profile_name, source, target))
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attributes::EdgeAttributes,
        distance::meters,
        geopoint::GeoPoint,
        test_graph_utils::test_graph::{
            disjoint_graph, line_graph, square_graph, OneWayProfile, UniformProfile,
        },
    };

    fn uniform_router(graph: RoadGraph) -> Router {
        let mut router = Router::new(graph);
        router.register_profile(Box::new(UniformProfile));
        router
    }

    fn corner(router: &Router, edge: usize, offset: f32) -> RouterPoint {
        let polyline = router.graph().edge_polyline(edge);
        let point = crate::geometry::point_at_offset(&polyline, offset);
        RouterPoint::new(edge, offset, point)
    }

    #[test]
    fn square_corner_to_corner_weighs_two() {
        let router = uniform_router(square_graph());

        let source = corner(&router, 0, 0.0);
        let target = corner(&router, 1, 1.0);

        let route = router.try_calculate("uniform", &source, &target).unwrap();
        assert!((route.weight() - 2.0).abs() < 1e-6);
        assert_eq!(route.segments().len(), 2);
        assert_eq!(route.distance(), meters!(2));
    }

    #[test]
    fn contracted_and_plain_engines_agree() {
        let mut router = uniform_router(square_graph());

        let pairs = [
            ((0, 0.0), (1, 1.0)),
            ((0, 0.25), (2, 0.6)),
            ((3, 0.5), (1, 0.5)),
            ((2, 1.0), (0, 0.0)),
        ];

        let mut plain_weights = Vec::new();
        for &((se, so), (te, to)) in &pairs {
            let source = corner(&router, se, so);
            let target = corner(&router, te, to);
            let route = router.try_calculate("uniform", &source, &target).unwrap();
            plain_weights.push(route.weight());
        }

        router.add_contracted_graph("uniform").unwrap();
        assert!(router.has_contracted_graph("uniform"));

        for (&((se, so), (te, to)), &plain) in pairs.iter().zip(&plain_weights) {
            let source = corner(&router, se, so);
            let target = corner(&router, te, to);
            let route = router.try_calculate("uniform", &source, &target).unwrap();
            assert!(
                (route.weight() - plain).abs() < 1e-4,
                "contracted {} vs plain {}",
                route.weight(),
                plain
            );
        }
    }

    #[test]
    fn contracted_line_route_unpacks_fully() {
        let mut router = uniform_router(line_graph());
        router.add_contracted_graph("uniform").unwrap();

        let source = corner(&router, 0, 0.0);
        let target = corner(&router, 3, 1.0);

        let route = router.try_calculate("uniform", &source, &target).unwrap();
        assert!((route.weight() - 4.0).abs() < 1e-6);
        assert_eq!(route.segments().len(), 4);
        let edges: Vec<usize> = route.segments().iter().map(|s| s.edge()).collect();
        assert_eq!(edges, vec![0, 1, 2, 3]);
    }

    #[test]
    fn disjoint_components_have_no_route() {
        let router = uniform_router(disjoint_graph());

        let source = corner(&router, 0, 0.5);
        let target = corner(&router, 1, 0.5);

        assert!(matches!(
            router.try_calculate("uniform", &source, &target),
            Err(RoutingError::RouteNotFound(_))
        ));
    }

    #[test]
    fn identical_points_give_a_single_coordinate_route() {
        let router = uniform_router(square_graph());
        let point = corner(&router, 0, 0.5);

        let route = router.try_calculate("uniform", &point, &point).unwrap();
        assert_eq!(route.shape().len(), 1);
        assert!(route.distance().is_zero());
        assert!(route.segments().is_empty());
    }

    #[test]
    fn same_edge_route_skips_the_engines() {
        let router = uniform_router(line_graph());

        let source = corner(&router, 1, 0.2);
        let target = corner(&router, 1, 0.9);

        let route = router.try_calculate("uniform", &source, &target).unwrap();
        assert_eq!(route.segments().len(), 1);
        assert!((route.weight() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn incompatible_same_edge_offsets_route_around() {
        // Vertices joined by a oneway edge and an unrestricted one.
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.001));
        graph.add_edge_with_distance(
            a,
            b,
            meters!(1),
            [("oneway", "yes")].into_iter().collect(),
            vec![],
        );
        graph.add_edge_with_distance(a, b, meters!(1), EdgeAttributes::new(), vec![]);

        let mut router = Router::new(graph);
        router.register_profile(Box::new(OneWayProfile));

        // Backward travel on the oneway edge is not allowed; the route
        // leaves at the end node, returns over the open edge and
        // re-enters from the start node.
        let source = corner(&router, 0, 0.7);
        let target = corner(&router, 0, 0.3);
        let route = router.try_calculate("oneway", &source, &target).unwrap();

        assert!((route.weight() - 1.6).abs() < 1e-5);
        assert_eq!(route.segments().len(), 3);
        assert_eq!(route.segments()[1].edge(), 1);
    }

    #[test]
    fn connectivity_depends_on_the_radius() {
        let router = uniform_router(line_graph());
        // The middle of the line: two weight units from either end.
        let point = corner(&router, 1, 1.0);

        // Inside the reachable span.
        assert!(router
            .try_check_connectivity("uniform", &point, 1.5)
            .unwrap());
        // Beyond what is reachable from the point, though smaller than
        // the component's diameter.
        assert!(!router
            .try_check_connectivity("uniform", &point, 3.0)
            .unwrap());
        // Beyond everything.
        assert!(!router
            .try_check_connectivity("uniform", &point, 10.0)
            .unwrap());
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.002));
        graph.add_edge(a, b, EdgeAttributes::new(), vec![]);
        let mut router = Router::new(graph);
        router.register_profile(Box::new(UniformProfile));

        let first = router.try_resolve(&["uniform"], 0.00002, 0.0011).unwrap();
        let again = router
            .try_resolve(&["uniform"], first.point().lat, first.point().lon)
            .unwrap();

        assert_eq!(first.edge(), again.edge());
        assert!((first.offset() - again.offset()).abs() < 1e-4);
    }

    #[test]
    fn near_vertex_resolution_and_partial_distance() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.002));
        graph.add_edge(a, b, EdgeAttributes::new(), vec![]);
        let edge_length = graph.edge(0).distance();

        let mut router = Router::new(graph);
        router.register_profile(Box::new(UniformProfile));

        let near_vertex = router.try_resolve(&["uniform"], 0.0, 1e-8).unwrap();
        assert!(near_vertex.offset() < 1e-4);
        assert!(
            near_vertex.point().distance(&GeoPoint::new(0.0, 0.0)) < meters!(0.01),
            "projection should sit within a centimeter of the vertex"
        );

        let midway = router.try_resolve(&["uniform"], 0.0, 0.001).unwrap();
        let route = router
            .try_calculate("uniform", &near_vertex, &midway)
            .unwrap();

        let expected =
            edge_length * ((midway.offset() - near_vertex.offset()) as f64);
        let error = (route.distance() - expected).value().abs();
        assert!(error < 0.1, "distance off by {error} m");
    }

    #[test]
    fn unknown_profiles_are_rejected() {
        let router = uniform_router(square_graph());
        let point = corner(&router, 0, 0.0);

        assert!(matches!(
            router.try_resolve(&["uniform", "hovercraft"], 0.0, 0.0),
            Err(RoutingError::ProfileUnsupported(_))
        ));
        assert!(matches!(
            router.try_calculate("hovercraft", &point, &point),
            Err(RoutingError::ProfileUnsupported(_))
        ));
        assert!(matches!(
            router.try_check_connectivity("hovercraft", &point, 1.0),
            Err(RoutingError::ProfileUnsupported(_))
        ));
        assert!(matches!(
            router.try_calculate_many("hovercraft", &[point], &[point]),
            Err(RoutingError::ProfileUnsupported(_))
        ));
    }

    #[test]
    fn canceled_queries_fail_with_canceled() {
        let router = uniform_router(square_graph());
        let source = corner(&router, 0, 0.0);
        let target = corner(&router, 1, 1.0);

        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(
            router.try_calculate_with_cancel("uniform", &source, &target, &cancel),
            Err(RoutingError::Canceled)
        ));
    }

    #[test]
    fn calculate_many_matches_individual_queries() {
        let router = uniform_router(square_graph());

        let sources = [corner(&router, 0, 0.0), corner(&router, 0, 0.5)];
        let targets = [corner(&router, 1, 1.0), corner(&router, 2, 0.5)];

        let matrix = router
            .try_calculate_many("uniform", &sources, &targets)
            .unwrap();
        assert_eq!(matrix.len(), 2);

        for (i, source) in sources.iter().enumerate() {
            assert_eq!(matrix[i].len(), 2);
            for (j, target) in targets.iter().enumerate() {
                let single = router.try_calculate("uniform", source, target).unwrap();
                let batched = matrix[i][j].as_ref().unwrap();
                assert!((single.weight() - batched.weight()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn custom_resolver_replaces_the_default() {
        let graph = square_graph();
        let fixed = RouterPoint::new(2, 0.25, GeoPoint::new(0.001, 0.00075));
        let options = RouterOptions {
            resolver: Resolver::Custom(Box::new(move |_, _| Ok(fixed))),
            ..RouterOptions::default()
        };

        let mut router = Router::with_options(graph, options);
        router.register_profile(Box::new(UniformProfile));

        let resolved = router.try_resolve(&["uniform"], 42.0, 42.0).unwrap();
        assert_eq!(resolved.edge(), 2);
        assert_eq!(resolved.offset(), 0.25);
    }

    #[test]
    fn route_weight_equals_segment_weights() {
        let mut router = uniform_router(square_graph());
        router.add_contracted_graph("uniform").unwrap();

        let source = corner(&router, 0, 0.25);
        let target = corner(&router, 2, 0.75);
        let route = router.try_calculate("uniform", &source, &target).unwrap();

        let total: Weight = route.segments().iter().map(|s| s.weight()).sum();
        assert!((route.weight() - total).abs() < 1e-6);
    }
}
