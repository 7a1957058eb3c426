mod assert_almost_eq;
