//! Returning fronds and whole subtrees to the free pool.

use fern::util::testing;
use fern::{Fern, FernError, FrondId, Settings};
use rstest::{fixture, rstest};

/// Root -> a -> {a1 -> a11, a2}, Root -> b
struct Grove {
    fern: Fern<String>,
    a: FrondId,
    a1: FrondId,
    a11: FrondId,
    a2: FrondId,
    b: FrondId,
}

#[fixture]
fn grove() -> Grove {
    testing::init_test_setup();
    let mut fern = Fern::new(10).unwrap();
    let a = fern.allocate(FrondId::ROOT, "a".to_string()).unwrap();
    let a1 = fern.allocate(a, "a1".to_string()).unwrap();
    let a11 = fern.allocate(a1, "a11".to_string()).unwrap();
    let a2 = fern.allocate(a, "a2".to_string()).unwrap();
    let b = fern.allocate(FrondId::ROOT, "b".to_string()).unwrap();
    Grove {
        fern,
        a,
        a1,
        a11,
        a2,
        b,
    }
}

#[rstest]
fn given_leaf_when_released_then_one_frond_returns_to_pool(mut grove: Grove) {
    let before = grove.fern.free_count();
    assert_eq!(grove.fern.release(grove.a11).unwrap(), 1);

    assert_eq!(grove.fern.free_count(), before + 1);
    assert!(!grove.fern.is_attached(grove.a11));
    assert_eq!(grove.fern.children(grove.a1).unwrap().count(), 0);
    grove.fern.verify().unwrap();
}

#[rstest]
fn given_subtree_when_released_then_every_descendant_returns(mut grove: Grove) {
    assert_eq!(grove.fern.subtree_size(grove.a).unwrap(), 3);
    assert_eq!(grove.fern.release(grove.a).unwrap(), 4);

    assert_eq!(grove.fern.free_count(), 9);
    for id in [grove.a, grove.a1, grove.a11, grove.a2] {
        assert!(!grove.fern.is_attached(id));
        assert_eq!(grove.fern.parent_of(id), FrondId::INVALID);
    }
    assert!(grove.fern.is_attached(grove.b));
    let roots: Vec<_> = grove.fern.children(FrondId::ROOT).unwrap().collect();
    assert_eq!(roots, vec![grove.b]);
    grove.fern.verify().unwrap();
}

#[rstest]
fn given_subtree_when_released_with_callback_then_payloads_come_back_leaves_first(
    mut grove: Grove,
) {
    let mut reclaimed = Vec::new();
    let released = grove
        .fern
        .release_with(grove.a, |id, payload| reclaimed.push((id, payload)))
        .unwrap();

    assert_eq!(released, 4);
    let names: Vec<_> = reclaimed.iter().map(|(_, name)| name.as_str()).collect();
    assert_eq!(names, vec!["a2", "a11", "a1", "a"]);
    assert_eq!(reclaimed.last().map(|(id, _)| *id), Some(grove.a));
}

#[rstest]
fn given_released_fronds_when_allocating_then_they_are_reused(mut grove: Grove) {
    grove.fern.release(grove.a1).unwrap();
    let reused = grove.fern.allocate(grove.b, "b1".to_string()).unwrap();

    // the subtree top is released last, so it heads the pool
    assert_eq!(reused, grove.a1);
    assert_eq!(grove.fern.parent_of(reused), grove.b);
    assert_eq!(grove.fern.payload_of(reused).unwrap(), "b1");
    grove.fern.verify().unwrap();
}

#[rstest]
fn given_released_frond_when_used_as_parent_then_allocation_fails(mut grove: Grove) {
    grove.fern.release(grove.a2).unwrap();
    let free = grove.fern.free_count();

    assert_eq!(
        grove.fern.allocate(grove.a2, "orphan".to_string()),
        Err(FernError::InvalidParent(grove.a2))
    );
    assert_eq!(grove.fern.free_count(), free);
}

#[rstest]
fn given_sentinels_or_free_ids_when_released_then_fails(mut grove: Grove) {
    assert_eq!(
        grove.fern.release(FrondId::ROOT),
        Err(FernError::Sentinel(FrondId::ROOT))
    );
    assert_eq!(
        grove.fern.release(FrondId::INVALID),
        Err(FernError::Sentinel(FrondId::INVALID))
    );
    grove.fern.release(grove.b).unwrap();
    assert_eq!(grove.fern.release(grove.b), Err(FernError::Detached(grove.b)));
    assert!(matches!(
        grove.fern.release(FrondId::from_raw(99)),
        Err(FernError::OutOfRange { .. })
    ));
    grove.fern.verify().unwrap();
}

#[rstest]
fn given_every_root_child_released_then_arena_is_back_to_full_capacity(mut grove: Grove) {
    let tops: Vec<_> = grove.fern.children(FrondId::ROOT).unwrap().collect();
    for top in tops {
        grove.fern.release(top).unwrap();
    }
    assert_eq!(grove.fern.free_count(), grove.fern.capacity());
    assert_eq!(grove.fern.attached_count(), 0);
    grove.fern.verify().unwrap();
}

#[test]
fn given_verify_on_release_when_releasing_then_arena_stays_consistent() {
    let settings = Settings {
        capacity: 4,
        verify_on_release: true,
    };
    let mut fern = Fern::from_settings(&settings).unwrap();
    let a = fern.allocate(FrondId::ROOT, 1u32).unwrap();
    fern.allocate(a, 2).unwrap();
    assert_eq!(fern.release(a), Ok(2));
}
