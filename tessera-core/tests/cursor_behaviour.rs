//! Behavioural tests for streaming and cached cursors using rstest-bdd.

mod rows;
mod support;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tessera_core::{
    CursorError, CursorResource, FeatureParts, ForwardCursor, GeoFeatureFormat, HeapCacheCursor,
    MutableCursor, RowSupplier, SeekableCursor, StoreError, StreamingCursor, VecRowSupplier,
};

use rows::parts;
use support::feature;

/// Supplier recording how often the backend is asked for rows.
struct ObservedSupplier {
    rows: VecRowSupplier,
    loads: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
}

impl RowSupplier for ObservedSupplier {
    fn try_load_next(&mut self, parts: &mut FeatureParts) -> Result<bool, StoreError> {
        self.loads.set(self.loads.get().saturating_add(1));
        self.rows.try_load_next(parts)
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get().saturating_add(1));
    }
}

/// Shared state for cursor scenarios.
#[derive(Debug, Default)]
struct CursorWorld {
    streaming: RefCell<Option<StreamingCursor<GeoFeatureFormat>>>,
    cached: RefCell<Option<HeapCacheCursor<GeoFeatureFormat>>>,
    loads: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
    visited: RefCell<Vec<String>>,
}

impl CursorWorld {
    fn with_streaming<T>(&self, f: impl FnOnce(&mut StreamingCursor<GeoFeatureFormat>) -> T) -> T {
        let mut slot = self.streaming.borrow_mut();
        f(slot.as_mut().expect("a streaming cursor should be open"))
    }

    fn with_cached<T>(&self, f: impl FnOnce(&mut HeapCacheCursor<GeoFeatureFormat>) -> T) -> T {
        let mut slot = self.cached.borrow_mut();
        f(slot.as_mut().expect("a cached cursor should be open"))
    }
}

fn current_id(cursor: &mut impl ForwardCursor) -> String {
    cursor
        .id()
        .expect("positioned on a row")
        .map(String::from)
        .expect("row id")
}

#[fixture]
fn world() -> CursorWorld {
    CursorWorld::default()
}

#[given("a streaming cursor over three rows")]
fn streaming_cursor(world: &CursorWorld) {
    let supplier = ObservedSupplier {
        rows: VecRowSupplier::new(["r1", "r2", "r3"].map(|id| parts(id, "v1"))),
        loads: Rc::clone(&world.loads),
        closes: Rc::clone(&world.closes),
    };
    world.streaming.replace(Some(StreamingCursor::new(supplier)));
}

#[given("a cached cursor over \"a\", \"b\" and \"c\"")]
fn cached_cursor(world: &CursorWorld) {
    let cursor = HeapCacheCursor::<GeoFeatureFormat>::from_features(["a", "b", "c"].map(feature));
    world.cached.replace(Some(cursor));
}

#[given("a cached cursor over \"a\", \"b\" and \"c\" submitted as \"c\", \"a\" and \"b\"")]
fn cached_cursor_with_order(world: &CursorWorld) {
    let order = HashMap::from([
        (String::from("c"), 0),
        (String::from("a"), 1),
        (String::from("b"), 2),
    ]);
    let cursor = HeapCacheCursor::<GeoFeatureFormat>::from_features(["a", "b", "c"].map(feature))
        .with_original_order(order);
    assert!(cursor.has_original_order());
    world.cached.replace(Some(cursor));
}

#[when("the rows are walked asking has_next three times per step")]
fn walk_asking_repeatedly(world: &CursorWorld) {
    let visited = world.with_streaming(|cursor| {
        let mut visited = Vec::new();
        loop {
            let more = cursor.has_next().expect("has_next");
            assert_eq!(cursor.has_next().expect("has_next"), more);
            assert_eq!(cursor.has_next().expect("has_next"), more);
            if !more {
                break;
            }
            cursor.next().expect("next");
            visited.push(current_id(cursor));
        }
        visited
    });
    world.visited.replace(visited);
}

#[when("the cursor is closed twice")]
fn close_twice(world: &CursorWorld) {
    world.with_streaming(|cursor| {
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
    });
}

#[when("the cursor is materialized")]
fn materialize(world: &CursorWorld) {
    let streaming = world
        .streaming
        .borrow_mut()
        .take()
        .expect("a streaming cursor should be open");
    let cached =
        HeapCacheCursor::materialize(&GeoFeatureFormat, streaming).expect("materialize rows");
    world.cached.replace(Some(cached));
}

#[when("the cursor moves to \"b\" and removes it")]
fn remove_b(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert!(cursor.absolute(1).expect("seek"));
        assert_eq!(current_id(cursor), "b");
        let removed = cursor.remove_feature().expect("remove").expect("feature");
        assert_eq!(removed.id, "b");
    });
}

#[when("a feature \"d\" is added")]
fn add_d(world: &CursorWorld) {
    let position = world.with_cached(|cursor| cursor.add_feature(feature("d")).expect("add"));
    assert_eq!(position, 3);
}

#[when("the first row is replaced")]
fn replace_first(world: &CursorWorld) {
    let previous = world.with_cached(|cursor| {
        assert!(cursor.first().expect("first"));
        cursor.set_feature(feature("a")).expect("replace")
    });
    assert_eq!(previous.map(|replaced| replaced.id).as_deref(), Some("a"));
}

#[then("every row is visited once in order")]
fn visited_in_order(world: &CursorWorld) {
    assert_eq!(*world.visited.borrow(), ["r1", "r2", "r3"]);
}

#[then("the backend was asked for four rows")]
fn four_loads(world: &CursorWorld) {
    assert_eq!(world.loads.get(), 4);
}

#[then("reading the id before the first row fails out of bounds")]
fn id_before_first(world: &CursorWorld) {
    let error = world.with_streaming(|cursor| cursor.id().map(|id| id.map(String::from)));
    assert!(matches!(error, Err(CursorError::OutOfBounds { position: -1 })));
}

#[then("the backend was closed once")]
fn closed_once(world: &CursorWorld) {
    assert_eq!(world.closes.get(), 1);
}

#[then("asking for more rows fails because the cursor is closed")]
fn closed_has_next(world: &CursorWorld) {
    let result = world.with_streaming(|cursor| cursor.has_next());
    assert!(matches!(result, Err(CursorError::Closed)));
}

#[then("the cached cursor holds three rows with their geometry")]
fn cached_rows(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert_eq!(cursor.len(), 3);
        while cursor.try_next().expect("advance") {
            assert!(cursor.geometry().expect("geometry").is_some());
        }
    });
}

#[then("the last row can be read before the first")]
fn last_before_first(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert!(cursor.last().expect("last"));
        assert_eq!(current_id(cursor), "r3");
        assert!(cursor.first().expect("first"));
        assert_eq!(current_id(cursor), "r1");
    });
}

#[then("the cursor sits on \"a\"")]
fn sits_on_a(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert_eq!(cursor.position(), 0);
        assert_eq!(current_id(cursor), "a");
    });
}

#[then("the next row is \"c\"")]
fn next_is_c(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert!(cursor.try_next().expect("advance"));
        assert_eq!(current_id(cursor), "c");
        assert!(!cursor.has_next().expect("has_next"));
    });
}

#[then("restoring the submission order is refused")]
fn restore_refused(world: &CursorWorld) {
    world.with_cached(|cursor| {
        assert!(!cursor.has_original_order());
        assert!(!cursor.restore_input_order());
    });
}

#[scenario(path = "tests/features/cursor.feature", index = 0)]
fn lookahead_fetches_each_row_once(world: CursorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cursor.feature", index = 1)]
fn accessors_fail_outside_rows(world: CursorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cursor.feature", index = 2)]
fn materialize_gives_random_access(world: CursorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cursor.feature", index = 3)]
fn removing_current_row_steps_back(world: CursorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cursor.feature", index = 4)]
fn adding_rows_forgets_submission_order(world: CursorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/cursor.feature", index = 5)]
fn replacing_rows_forgets_submission_order(world: CursorWorld) {
    let _ = world;
}
