mod filter_roundtrip;
