#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::game::{play_random_until_over, GameColor, Position};
    use crate::ttt::{TttMove, TttPosition};

    #[test]
    fn simple_game_and_mate() {
        let to_pos = TttPosition::from_str;
        assert_eq!(to_pos("xxxoo____o").winner(), Some(GameColor::Player1));
        assert_eq!(to_pos("oo_xxx___o").winner(), Some(GameColor::Player1));
        assert_eq!(to_pos("oo____xxxo").winner(), Some(GameColor::Player1));
        assert_eq!(to_pos("oxxo__ox_x").winner(), Some(GameColor::Player2));
        assert_eq!(to_pos("xox_o_xo_x").winner(), Some(GameColor::Player2));
        assert_eq!(to_pos("xxo__o_xox").winner(), Some(GameColor::Player2));
        assert_eq!(to_pos("xxoooxxxoo").winner(), None);
    }

    #[test]
    fn score_and_terminal_value() {
        let pos = TttPosition::from_str("xxxoo____o");
        assert!(pos.is_over());
        assert_eq!(pos.score(), 1.0);
        /* O is to move and X already won */
        assert_eq!(pos.terminal_value(), -1.0);

        let draw = TttPosition::from_str("xxoooxxxoo");
        assert!(draw.is_over());
        assert_eq!(draw.score(), 0.0);
        assert_eq!(draw.terminal_value(), 0.0);
    }

    #[test]
    fn legal_moves() {
        let pos = TttPosition::new();
        assert_eq!(pos.legal_moves().len(), 9);

        let pos = TttPosition::from_str("x_o_x_o__x");
        assert_eq!(
            pos.legal_moves(),
            vec![TttMove::from_idx(1), TttMove::from_idx(3), TttMove::from_idx(5), TttMove::from_idx(7), TttMove::from_idx(8)]
        );

        let finished = TttPosition::from_str("xxxoo____o");
        assert!(finished.legal_moves().is_empty());
    }

    #[test]
    fn moved_position_does_not_mutate() {
        let pos = TttPosition::new();
        let next = pos.moved_position(TttMove::new(1, 1));
        assert_eq!(pos, TttPosition::new());
        assert_eq!(next.get_tile(1, 1), Some(GameColor::Player1));
        assert_eq!(next.turn(), GameColor::Player2);
        assert_eq!(next.to_string(), "____x____o");
    }

    #[test]
    fn random_games_terminate() {
        let mut rand = StdRng::seed_from_u64(0x5eed);
        for _ in 0..100 {
            let pos = play_random_until_over(&TttPosition::new(), &mut rand);
            assert!(pos.is_over());
            assert!(pos.legal_moves().is_empty());
        }
    }
}
