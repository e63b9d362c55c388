use tracker_engine::{Dice, DiceError, DiceTray, Translator, DIE_TYPES};

#[test]
fn seeded_rolls_stay_in_range_and_repeat() {
    let mut a = Dice::from_seed(2025);
    let mut b = Dice::from_seed(2025);
    for sides in DIE_TYPES {
        for _ in 0..200 {
            let r = a.roll(sides);
            assert!((1..=sides).contains(&r));
            assert_eq!(r, b.roll(sides));
        }
    }
}

#[test]
fn empty_tray_rolls_nothing() {
    let tray = DiceTray::new();
    assert!(tray.is_empty());
    assert!(tray.roll(&mut Dice::from_seed(1)).is_none());
}

#[test]
fn counters_only_accept_known_dice() {
    let mut tray = DiceTray::new();
    assert_eq!(tray.add(6), Ok(1));
    assert_eq!(tray.add(6), Ok(2));
    assert_eq!(tray.add(7), Err(DiceError::UnsupportedDie(7)));
    tray.add_notation("3d20").unwrap();
    assert_eq!(tray.count(20), 3);

    tray.reset(6).unwrap();
    assert_eq!(tray.count(6), 0);
    tray.reset_all();
    assert!(tray.is_empty());
}

#[test]
fn tray_roll_groups_by_die_in_order() {
    let mut tray = DiceTray::new();
    tray.add_notation("1d20").unwrap();
    tray.add_notation("2d6").unwrap();

    let mut dice = Dice::from_scripted(vec![4, 5, 17]);
    let roll = tray.roll(&mut dice).unwrap();
    assert_eq!(roll.groups.len(), 2);
    assert_eq!(roll.groups[0].sides, 6);
    assert_eq!(roll.groups[0].results, vec![4, 5]);
    assert_eq!(roll.groups[1].results, vec![17]);
    assert_eq!(roll.total, 26);
}

#[test]
fn rendered_results_follow_the_language() {
    let mut tray = DiceTray::new();
    tray.set(8, 2).unwrap();
    tray.set(100, 1).unwrap();
    let roll = tray.roll(&mut Dice::from_scripted(vec![3, 8, 42])).unwrap();

    let tr = Translator::builtin();
    insta::assert_snapshot!(roll.render(&tr), @r###"
    Résultats
    2D8: 3, 8
    1D100: 42
    Total: 53
    "###);

    tr.set_language("en").unwrap();
    insta::assert_snapshot!(roll.render(&tr), @r###"
    Results
    2D8: 3, 8
    1D100: 42
    Total: 53
    "###);
}
