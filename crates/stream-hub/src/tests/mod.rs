mod ws_test;
