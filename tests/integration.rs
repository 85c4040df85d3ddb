//! End-to-end tests for the bridge over the reference engine.
//!
//! These tests go through the public surface only: sessions, typed terms,
//! numeral extraction, solvers and models, and configuration loading.

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive};

use termbridge::config::SessionConfig;
use termbridge::error::{BridgeError, CategoryError, ConfigError};
use termbridge::native::{ErrorCode, SortKind};
use termbridge::solver::SatResult;
use termbridge::terms::{BV, Int, Real, Term};
use termbridge::{Dynamic, Expr, NumeralValue, Session};

fn baseline(session: &Session) -> usize {
    // Pin a permanent node so the "last result" slot does not skew counts.
    let _ = session.bool_sort().unwrap();
    session.live_object_count().unwrap()
}

#[test]
fn equal_sums_share_one_canonical_term() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let one = session.int(1).unwrap();
    let two = session.int(2).unwrap();

    let a = x.add(&two).unwrap().simplify().unwrap();
    let b = x.add(&one).unwrap().add(&one).unwrap().simplify().unwrap();

    assert_eq!(a, b);
    assert_eq!(a.expr().ast_hash().unwrap(), b.expr().ast_hash().unwrap());
    assert_eq!(a.expr().ast_id().unwrap(), b.expr().ast_id().unwrap());
    assert_eq!(a.to_string(), "(+ 2 x)");
}

#[test]
fn rational_numerator_and_denominator() {
    let session = Session::default_session();
    let q = session.real(5, 4).unwrap();
    let (numer, denom) = q.as_rat().unwrap().unwrap();
    assert_eq!(numer.as_i64().unwrap(), NumeralValue::Value(5));
    assert_eq!(denom.as_i64().unwrap(), NumeralValue::Value(4));
    assert_eq!(numer.as_big_int().unwrap(), NumeralValue::Value(BigInt::from(5)));
}

#[test]
fn bit_vector_sign_correction() {
    let session = Session::default_session();

    let narrow = session.bv(15, 4).unwrap();
    assert_eq!(narrow.as_i64().unwrap(), NumeralValue::Value(-1));

    let boundary = BigInt::one() << 63u32;
    for (width, expected) in [
        (64, NumeralValue::Value(i64::MIN)),
        (65, NumeralValue::DoesNotFit),
    ] {
        let sort = session.bv_sort(width).unwrap();
        let term = BV::try_from(session.from_big_int(&boundary, &sort).unwrap()).unwrap();
        assert_eq!(term.as_i64().unwrap(), expected, "width {width}");
        // The fixed-width reading agrees with the exact one whenever it fits.
        let exact = term.as_big_int().unwrap().value().unwrap();
        match expected {
            NumeralValue::Value(v) => assert_eq!(exact, BigInt::from(v)),
            _ => assert_eq!(exact, boundary),
        }
    }
}

#[test]
fn signed_readings_agree_across_widths() {
    let session = Session::default_session();
    for width in [1u32, 4, 63, 64, 65, 128] {
        let sort = session.bv_sort(width).unwrap();
        let half = BigInt::one() << (width - 1);
        let full = BigInt::one() << width;
        let patterns = [
            BigInt::from(0),
            BigInt::from(1),
            &half - 1,
            half.clone(),
            &full - 1,
        ];
        for pattern in patterns {
            let term = BV::try_from(session.from_big_int(&pattern, &sort).unwrap()).unwrap();
            let signed = if pattern >= half {
                &pattern - &full
            } else {
                pattern.clone()
            };
            assert_eq!(
                term.as_big_int().unwrap(),
                NumeralValue::Value(signed.clone()),
                "width {width}, pattern {pattern}"
            );
            let expected = signed
                .to_i64()
                .map_or(NumeralValue::DoesNotFit, NumeralValue::Value);
            assert_eq!(term.as_i64().unwrap(), expected, "width {width}, pattern {pattern}");
            let unsigned = pattern
                .to_u64()
                .map_or(NumeralValue::DoesNotFit, NumeralValue::Value);
            assert_eq!(term.as_u64().unwrap(), unsigned, "width {width}, pattern {pattern}");
        }
    }

    let all_ones = |width: u32| {
        let sort = session.bv_sort(width).unwrap();
        let ones = (BigInt::one() << width) - 1;
        BV::try_from(session.from_big_int(&ones, &sort).unwrap()).unwrap()
    };
    assert_eq!(all_ones(64).as_i64().unwrap(), NumeralValue::Value(-1));
    let widest = all_ones(128).as_i64().unwrap();
    assert_eq!(widest, NumeralValue::Value(-1));
    assert!(widest.fits());
}

#[test]
fn unsigned_integers_above_the_signed_range() {
    let session = Session::default_session();
    let int = session.int_sort().unwrap();
    let read = |value: BigInt| Int::try_from(session.from_big_int(&value, &int).unwrap()).unwrap();

    let above = read(BigInt::from(i64::MAX) + 1);
    assert_eq!(above.as_i64().unwrap(), NumeralValue::DoesNotFit);
    assert_eq!(above.as_u64().unwrap(), NumeralValue::Value(i64::MAX as u64 + 1));

    let top = read(BigInt::from(u64::MAX));
    assert_eq!(top.as_u64().unwrap(), NumeralValue::Value(u64::MAX));
    assert_eq!(top.as_u64().unwrap().into_parts(), (u64::MAX, true, true));

    let beyond = read(BigInt::from(u64::MAX) + 1);
    assert_eq!(beyond.as_u64().unwrap(), NumeralValue::DoesNotFit);
    assert_eq!(beyond.as_big_int().unwrap(), NumeralValue::Value(BigInt::from(u64::MAX) + 1));

    let negative = read(BigInt::from(-1));
    assert_eq!(negative.as_u64().unwrap(), NumeralValue::DoesNotFit);
    assert_eq!(negative.as_i64().unwrap(), NumeralValue::Value(-1));
}

#[test]
fn non_numerals_report_not_a_numeral() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let b = session.bv_const("b", 16).unwrap();
    let r = session.real_const("r").unwrap();

    assert_eq!(x.as_i64().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(x.as_u64().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(x.as_big_int().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(b.as_i64().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(b.as_u64().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(b.as_big_int().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(b.as_big_uint().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(r.as_big_rational().unwrap(), NumeralValue::NotANumeral);
    assert_eq!(x.as_i64().unwrap().into_parts(), (0, false, false));
}

#[test]
fn lifting_agrees_with_the_engine() {
    let session = Session::default_session();
    let int = session.int_sort().unwrap();
    let real = session.real_sort().unwrap();
    let bv = session.bv_sort(12).unwrap();
    let arr = session.array_sort(&int, &real).unwrap();
    let s = session.uninterpreted_sort("U").unwrap();

    for sort in [&int, &real, &bv, &arr, &s] {
        let c = session.fresh_constant("k", sort).unwrap();
        assert_eq!(c.kind(), sort.kind());
        let untyped: Expr = c.clone().into_expr();
        assert_eq!(untyped.sort_kind().unwrap(), c.kind());
        assert_eq!(untyped.lift().unwrap().kind(), c.kind());
    }

    let x = session.int_const("x").unwrap();
    let wrong = Real::try_from(Dynamic::from(x));
    assert!(matches!(
        wrong,
        Err(BridgeError::Category(CategoryError::WrongCategory {
            actual: SortKind::Int,
            ..
        }))
    ));
}

#[test]
fn wrapping_and_dropping_leaves_counts_unchanged() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let y = session.int_const("y").unwrap();
    let sum = x.add(&y).unwrap();
    let raw = sum.expr().raw();
    let before = baseline(&session);

    let copies: Vec<Expr> = (0..16).map(|_| Expr::wrap(&session, raw).unwrap()).collect();
    assert!(copies.iter().all(|c| *c == *sum.expr()));
    drop(copies);

    assert_eq!(baseline(&session), before);
    assert_eq!(sum.to_string(), "(+ x y)");
}

#[test]
fn temporary_terms_are_released() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let before = baseline(&session);
    {
        let three = session.int(3).unwrap();
        let product = x.mul(&three).unwrap();
        let _ = product.gt(&x).unwrap().simplify().unwrap();
    }
    assert_eq!(baseline(&session), before);
}

#[test]
fn native_failures_leave_the_session_usable() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let p = session.bool_const("p").unwrap();
    let before = baseline(&session);

    let err = x.expr().equals(p.expr()).unwrap_err();
    assert_eq!(err.native_code(), Some(ErrorCode::SortError));
    assert_eq!(baseline(&session), before);

    let two = session.int(2).unwrap();
    assert_eq!(x.add(&two).unwrap().to_string(), "(+ x 2)");
}

#[test]
fn solver_round_trip() {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let y = session.int_const("y").unwrap();
    let five = session.int(5).unwrap();
    let one = session.int(1).unwrap();

    let solver = session.solver().unwrap();
    solver.assert(&x.add(&y).unwrap().equals(&five).unwrap()).unwrap();
    solver.assert(&x.gt(&y).unwrap()).unwrap();
    solver.assert(&y.ge(&one).unwrap()).unwrap();
    assert_eq!(solver.check().unwrap(), SatResult::Sat);

    let model = solver.model().unwrap();
    let xv = model.eval_term(&x, true).unwrap().unwrap().as_i64().unwrap();
    let yv = model.eval_term(&y, true).unwrap().unwrap().as_i64().unwrap();
    let (xv, yv) = (xv.value().unwrap(), yv.value().unwrap());
    assert_eq!(xv + yv, 5);
    assert!(xv > yv && yv >= 1);

    // A term the model never mentions stays symbolic without completion.
    let z = session.int_const("z").unwrap();
    let open = model.eval_term(&z, false).unwrap().unwrap();
    assert_eq!(open.as_i64().unwrap(), NumeralValue::NotANumeral);
    let completed = model.eval_term(&z, true).unwrap().unwrap();
    assert!(completed.as_i64().unwrap().fits());
}

#[test]
fn bounded_bit_vector_search_is_complete() {
    let session = Session::default_session();
    let b = session.bv_const("b", 3).unwrap();
    let seven = session.bv(7, 3).unwrap();
    let solver = session.solver().unwrap();
    solver.assert(&b.ugt(&seven).unwrap()).unwrap();
    assert_eq!(solver.check().unwrap(), SatResult::Unsat);
}

#[test]
fn candidate_limit_yields_unknown() {
    let config = SessionConfig::new().with("max_candidates", "50");
    let session = Session::new(&config).unwrap();
    let x = session.int_const("x").unwrap();
    let two = session.int(2).unwrap();
    let solver = session.solver().unwrap();
    solver.assert(&x.mul(&x).unwrap().equals(&two).unwrap()).unwrap();
    assert_eq!(solver.check().unwrap(), SatResult::Unknown);
    assert_eq!(solver.reason_unknown().unwrap(), "candidate limit reached");
}

#[test]
fn square_root_bounds() {
    let session = Session::default_session();
    let two = session.real(2, 1).unwrap();
    let half = session.real(1, 2).unwrap();
    let root = two.power(&half).unwrap().simplify().unwrap();
    let (lower, upper) = root.approx(6).unwrap().unwrap();
    let lower = lower.as_big_rational().unwrap().value().unwrap();
    let upper = upper.as_big_rational().unwrap().value().unwrap();
    let two = BigInt::from(2);
    assert!(lower.clone() * lower.clone() < num_rational::BigRational::from_integer(two.clone()));
    assert!(upper.clone() * upper.clone() > num_rational::BigRational::from_integer(two));
}

#[test]
fn configuration_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("session.toml");
    std::fs::write(&path, "timeout = 250\n[search]\nlimit = 3\n").unwrap();

    let config = SessionConfig::load(&path).unwrap();
    assert_eq!(config.get("timeout"), Some("250"));
    assert_eq!(config.get("search.limit"), Some("3"));

    // Dotted keys are not engine parameters.
    assert!(matches!(
        Session::new(&config),
        Err(BridgeError::Config(ConfigError::UnknownParameter { .. }))
    ));

    let mut ok = SessionConfig::new();
    ok.set("timeout", "250").set_bool("model", true);
    assert!(Session::new(&ok).is_ok());
}

#[test]
fn typed_operators_check_categories_locally() {
    let session = Session::default_session();
    let int = session.int_sort().unwrap();
    assert!(matches!(
        int.bv_size(),
        Err(BridgeError::Category(CategoryError::WrongCategory { .. }))
    ));
    let five = session.from_i64(5, &int).unwrap();
    let as_int: Int = five.clone().try_into().unwrap();
    assert_eq!(as_int.as_i64().unwrap(), NumeralValue::Value(5));
    assert_eq!(five.as_u64().unwrap(), NumeralValue::Value(5));
}
