//! Statement rendering over derived entities.

mod common;

use common::{Game, User, new_game};
use tagorm::{Arg, NullString, OrmError, args, build};

#[test]
fn and_then_or() {
    let (sql, args) = build()
        .from(&Game::default(), "g")
        .and(
            &Game {
                code: "code".into(),
                enabled: true,
                ..Default::default()
            },
            "g",
        )
        .or(
            &Game {
                id: 1,
                code: "code".into(),
                ..Default::default()
            },
            "g",
        )
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.enabled = $1 AND g.game_code = $2 \
         OR g.game_code = $3 OR g.game_id = $4 LIMIT 100 OFFSET 0"
    );
    assert_eq!(args.len(), 4);
    assert_eq!(args[0], Arg::Bool(true));
    assert_eq!(args[3], Arg::Int(1));
}

#[test]
fn and_only() {
    let (sql, args) = build()
        .from(&Game::default(), "g")
        .and(
            &Game {
                code: "code".into(),
                enabled: true,
                ..Default::default()
            },
            "g",
        )
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.enabled = $1 AND g.game_code = $2 LIMIT 100 OFFSET 0"
    );
    assert_eq!(args.len(), 2);
}

#[test]
fn or_only() {
    let (sql, args) = build()
        .from(&Game::default(), "g")
        .or(
            &Game {
                code: "code".into(),
                enabled: true,
                ..Default::default()
            },
            "g",
        )
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.enabled = $1 OR g.game_code = $2 LIMIT 100 OFFSET 0"
    );
    assert_eq!(args.len(), 2);
}

#[test]
fn join_then_where() {
    let game = Game {
        id: 1,
        code: "code".into(),
        ..Default::default()
    };
    let (sql, args) = build()
        .from(&game, "g")
        .join(&User::default(), "u", &["u.id = g.user_id"])
        .where_raw("u.name like %| ? |%", args!["budi"])
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT g.*, u.* FROM ref_game g JOIN ref_user u ON u.id = g.user_id \
         WHERE g.game_code = $1 AND g.game_id = $2 AND u.name like %| $3 |% LIMIT 100 OFFSET 0"
    );
    assert_eq!(
        args,
        vec![Arg::Text("code".into()), Arg::Int(1), Arg::Text("budi".into())]
    );
}

#[test]
fn from_by_example() {
    let game = Game {
        id: 507,
        description: NullString::from("Froze"),
        ..Default::default()
    };
    let (sql, args) = build().from(&game, "g").to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.game_description = $1 AND g.game_id = $2 LIMIT 100 OFFSET 0"
    );
    assert_eq!(args.len(), 2);
}

#[test]
fn text_fields_keep_their_spelling() {
    let game = Game {
        code: "007".into(),
        title: "T".into(),
        description: NullString::from("08675467484389"),
        ..Default::default()
    };
    let (sql, args) = build().from(&game, "g").to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.game_code = $1 AND g.game_description = $2 \
         AND g.game_title = $3 LIMIT 100 OFFSET 0"
    );
    assert_eq!(
        args,
        vec![
            Arg::Text("007".into()),
            Arg::Text("08675467484389".into()),
            Arg::Text("T".into()),
        ]
    );
}

#[test]
fn updates_few_fields() {
    let game = Game {
        id: 507,
        code: "b6b4a1f0".into(),
        title: "DOTA2".into(),
        description: NullString::from("Froze"),
        enabled: true,
        ..Default::default()
    };
    let (sql, args) = build()
        .updates(&game)
        .where_raw("game_code = ? AND game_description > ?", args![&game.code, 23])
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE ref_game SET enabled = $2, game_code = $3, game_description = $4, \
         game_title = $5, write_date = $1 WHERE game_code = $6 AND game_description > $7 \
         RETURNING game_id"
    );
    assert_eq!(args.len(), 7);
    assert!(matches!(args[0], Arg::Timestamp(_)));
}

#[test]
fn updates_all_fields() {
    let game = new_game();
    let (sql, args) = build()
        .updates(&game)
        .where_raw("game_code = ? AND game_description > ?", args![&game.code, 23])
        .to_sql()
        .unwrap();
    assert!(sql.starts_with(
        "UPDATE ref_game SET enabled = $2, game_code = $3, game_description = $4, \
         game_title = $5, rate = $6, release = $7, write_date = $1"
    ));
    assert_eq!(args.len(), 9);
}

#[test]
fn updates_can_write_zero_through_nullable() {
    let game = Game {
        id: 3,
        rate: tagorm::NullInt64::new(0),
        ..Default::default()
    };
    let (sql, args) = build().updates(&game).to_sql().unwrap();
    assert_eq!(
        sql,
        "UPDATE ref_game SET rate = $2, write_date = $1 RETURNING game_id"
    );
    assert_eq!(args[1], Arg::Int(0));
}

#[test]
fn insert_all_fields() {
    let game = new_game();
    let (sql, args) = build().tag("sql").insert(&game).to_sql().unwrap();
    assert_eq!(
        sql,
        "INSERT INTO ref_game (enabled, game_code, game_description, game_id, game_title, \
         rate, release, create_date, write_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING game_id"
    );
    assert_eq!(args.len(), 9);
    assert_eq!(args[4], Arg::Text("DOTA2".into()));
    assert_eq!(args[5], Arg::Int(75));
}

#[test]
fn inserts_many_rows() {
    let game = new_game();
    let games = vec![game.clone(), game.clone(), game];
    let (sql, args) = build().tag("sql").inserts(&games).to_sql().unwrap();
    assert!(sql.starts_with(
        "INSERT INTO ref_game (enabled, game_code, game_description, game_id, game_title, \
         rate, release, create_date, write_date) VALUES \
         ($1, $2, $3, $4, $5, $6, $7, $8, $9), ($10, $11, $12, $13, $14, $15, $16, $17, $18), "
    ));
    assert!(sql.ends_with("$27) RETURNING game_id"));
    assert_eq!(args.len(), 27);
}

#[test]
fn json_tag_key_reads_other_columns() {
    let game = Game {
        created_by: "ops".into(),
        code: "x".into(),
        ..Default::default()
    };
    let (sql, _) = build().tag("json").from(&game, "g").to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT g.* FROM ref_game g WHERE g.created_by = $1 AND g.game_code = $2 LIMIT 100 OFFSET 0"
    );
}

#[test]
fn placeholders_match_argument_positions() {
    let (sql, args) = build()
        .from(&Game { enabled: true, ..Default::default() }, "g")
        .where_raw("g.rate BETWEEN ? AND ?", args![10, 20])
        .or(&Game { title: "Chess".into(), ..Default::default() }, "g")
        .where_raw("g.release < now()", args![])
        .to_sql()
        .unwrap();
    for n in 1..=args.len() {
        assert!(sql.contains(&format!("${n}")), "missing ${n} in {sql}");
    }
    assert!(!sql.contains(&format!("${}", args.len() + 1)));
    assert!(!sql.contains('?'));
}

#[test]
fn limit_and_page() {
    let (sql, _) = build()
        .from(&Game::default(), "g")
        .limit(20)
        .page(4)
        .to_sql()
        .unwrap();
    assert!(sql.ends_with("LIMIT 20 OFFSET 60"));

    let (sql, _) = build().from(&Game::default(), "g").page(0).to_sql().unwrap();
    assert!(sql.ends_with("LIMIT 100 OFFSET 0"));
}

#[test]
fn mismatched_rows_are_reported() {
    let games = vec![
        new_game(),
        Game {
            code: "only-code".into(),
            ..Default::default()
        },
    ];
    let err = build().inserts(&games).to_sql().unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}
